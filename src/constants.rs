/// Upper bound on submitted source size. Oversized submissions are
/// rejected before anything is dispatched to the engine.
pub const MAX_CODE_SIZE_BYTES: usize = 200 * 1024;
