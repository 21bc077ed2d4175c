pub const SUCCESS: i32 = 0;
pub const EXECUTION_ERROR: i32 = 1;
pub const INVALID_INPUT: i32 = 2;
pub const CONNECTION_ERROR: i32 = 3;
