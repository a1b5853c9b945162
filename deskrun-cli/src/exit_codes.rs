//! Process exit codes, stable for scripts that call `deskrun`.

pub const SUCCESS: i32 = 0;
/// The plan (or a requested record) could not be parsed, validated or found.
pub const VALIDATION_FAILED: i32 = 2;
/// The plan ran and ended FAILED; its crash dump is in the audit dir.
pub const RUN_FAILED: i32 = 3;
/// I/O, config or runtime setup failure before a result existed.
pub const RUNTIME_ERROR: i32 = 4;
