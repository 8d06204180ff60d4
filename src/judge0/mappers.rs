use base64::{Engine as _, engine::general_purpose};

use crate::core::domain::Verdict;
use crate::core::traits::executor::{EngineRun, ExecuteError, ExecutionRequest};

use super::models::{
    EngineSubmission, MIN_MEMORY_LIMIT_MB, STATUS_ACCEPTED, STATUS_COMPILATION_ERROR,
    STATUS_PROCESSING, STATUS_RUNTIME_ERROR_FIRST, STATUS_RUNTIME_ERROR_LAST,
    STATUS_TIME_LIMIT_EXCEEDED, STATUS_WRONG_ANSWER,
};

/// Engine runtime id for a language name, aliases included.
pub fn language_id(language: &str) -> Option<u32> {
    let id = match language.to_lowercase().as_str() {
        "python" | "python3" | "py" => 71,
        "cpp" | "c++" => 54,
        "javascript" | "js" | "node" => 63,
        "java" => 62,
        "c" => 50,
        "csharp" | "c#" | "cs" => 51,
        "go" | "golang" => 60,
        "rust" => 73,
        "ruby" | "rb" => 72,
        "php" => 68,
        "typescript" | "ts" => 74,
        "kotlin" | "kt" => 78,
        "swift" => 83,
        _ => return None,
    };
    Some(id)
}

pub fn encode(text: &str) -> String {
    general_purpose::STANDARD.encode(text)
}

/// Decodes a base64 field. The engine wraps long payloads with newlines,
/// and occasionally returns plain text; both are tolerated.
pub fn decode(text: &str) -> String {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    match general_purpose::STANDARD.decode(cleaned) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => text.to_string(),
    }
}

/// Exact match after trimming trailing whitespace and newlines.
pub fn outputs_match(actual: &str, expected: &str) -> bool {
    actual.trim_end() == expected.trim_end()
}

/// Turns a terminal engine submission into a normalized run.
///
/// The comparison against the expected output happens here, not on the
/// engine: a clean run whose output mismatches is downgraded to
/// `WrongAnswer`. The engine has no distinct memory-limit status; a
/// runtime error at or above the applied memory limit normalizes to
/// `MemoryLimitExceeded`. Engine-internal statuses are infrastructure
/// errors, not verdicts, so the dispatcher can retry them.
pub fn normalize(
    submission: EngineSubmission,
    request: &ExecutionRequest,
) -> Result<EngineRun, ExecuteError> {
    let status = submission.status.ok_or_else(|| ExecuteError::Protocol {
        msg: "missing status".to_string(),
    })?;
    if status.id <= STATUS_PROCESSING {
        return Err(ExecuteError::Protocol {
            msg: format!("non-terminal status {}", status.id),
        });
    }

    let stdout = submission.stdout.as_deref().map(decode).unwrap_or_default();
    let stderr = submission.stderr.as_deref().map(decode).unwrap_or_default();
    let compile_output = submission.compile_output.as_deref().map(decode);
    let time_ms = submission
        .time
        .as_deref()
        .and_then(|t| t.trim().parse::<f64>().ok())
        .map(|secs| (secs * 1000.0).round() as u64)
        .unwrap_or(0);
    let memory_kb = submission.memory.unwrap_or(0);

    let verdict = match status.id {
        STATUS_ACCEPTED => {
            if outputs_match(&stdout, &request.expected_output) {
                Verdict::Accepted
            } else {
                Verdict::WrongAnswer
            }
        }
        STATUS_WRONG_ANSWER => Verdict::WrongAnswer,
        STATUS_TIME_LIMIT_EXCEEDED => Verdict::TimeLimitExceeded,
        STATUS_COMPILATION_ERROR => Verdict::CompilationError,
        id if (STATUS_RUNTIME_ERROR_FIRST..=STATUS_RUNTIME_ERROR_LAST).contains(&id) => {
            let applied_limit_kb = request.memory_limit_mb.max(MIN_MEMORY_LIMIT_MB) * 1024;
            if memory_kb >= applied_limit_kb {
                Verdict::MemoryLimitExceeded
            } else {
                Verdict::RuntimeError
            }
        }
        id => {
            return Err(ExecuteError::EngineInternal {
                status: if status.description.is_empty() {
                    format!("status {id}")
                } else {
                    status.description
                },
            });
        }
    };

    Ok(EngineRun {
        status_id: status.id,
        status: status.description,
        verdict,
        stdout,
        stderr,
        compile_output,
        time_ms,
        memory_kb,
    })
}
