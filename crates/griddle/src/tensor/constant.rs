/// # Constants with reserved meanings in Griddle

/// In a given tensor shape, Griddle reserves the `0th` dimension for rows
pub const ROW_DIM: usize = 0;

/// Size of the little-endian length prefix in front of every string record
pub const STRING_LENGTH_PREFIX: usize = 4;

/// Size of one code unit in a fixed-width native text array
pub const TEXT_CODE_UNIT: usize = 4;

/// Version of the array interface handed to the transform
pub const ARRAY_INTERFACE_VERSION: u32 = 3;
