use serde::{Deserialize, Serialize};

pub const STATUS_IN_QUEUE: i32 = 1;
pub const STATUS_PROCESSING: i32 = 2;
pub const STATUS_ACCEPTED: i32 = 3;
pub const STATUS_WRONG_ANSWER: i32 = 4;
pub const STATUS_TIME_LIMIT_EXCEEDED: i32 = 5;
pub const STATUS_COMPILATION_ERROR: i32 = 6;
/// Runtime errors span a family of statuses, one per signal/exit class.
pub const STATUS_RUNTIME_ERROR_FIRST: i32 = 7;
pub const STATUS_RUNTIME_ERROR_LAST: i32 = 12;
pub const STATUS_INTERNAL_ERROR: i32 = 13;

/// Engine floor for the memory limit; smaller requests are raised to it.
pub const MIN_MEMORY_LIMIT_MB: u64 = 128;
pub const MIN_CPU_TIME_SECS: f64 = 0.1;
pub const MIN_WALL_TIME_SECS: f64 = 5.0;
pub const MAX_OUTPUT_FILE_KB: u64 = 1024;

/// Wire payload for one submission. Text fields are base64-encoded;
/// limits use the engine's native units (seconds, kilobytes).
#[derive(Clone, Debug, Serialize)]
pub struct SubmissionPayload {
    pub source_code: String,
    pub language_id: u32,
    pub stdin: String,
    pub expected_output: String,
    pub cpu_time_limit: f64,
    pub memory_limit: u64,
    pub wall_time_limit: f64,
    pub max_file_size: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CreatedSubmission {
    pub token: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct EngineStatus {
    pub id: i32,
    pub description: String,
}

/// Polled submission state. Text fields stay base64-encoded until the
/// mapper decodes them; `time` is seconds as a decimal string, `memory`
/// is kilobytes.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct EngineSubmission {
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub compile_output: Option<String>,
    pub message: Option<String>,
    pub time: Option<String>,
    pub memory: Option<u64>,
    pub status: Option<EngineStatus>,
}
