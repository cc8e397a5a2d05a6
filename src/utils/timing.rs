use std::future::Future;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::info;

use crate::utils::logging::TIMING_TARGET;

/// Wall-clock span of one CLI command, reported on the timing stream.
/// Dropping an unfinished timer still emits the completion event.
#[derive(Debug)]
pub struct CommandTimer {
    command: String,
    user_id: Option<String>,
    started_at: DateTime<Utc>,
    started_perf: Instant,
    status: &'static str,
    detail: Option<String>,
    completed: bool,
}

impl CommandTimer {
    pub fn new(command: &str, user_id: Option<&str>) -> Self {
        CommandTimer {
            command: command.to_string(),
            user_id: user_id.map(str::to_string),
            started_at: Utc::now(),
            started_perf: Instant::now(),
            status: "success",
            detail: None,
            completed: false,
        }
    }

    pub fn log_received(&self) {
        info!(
            target: TIMING_TARGET,
            event = "command_received",
            command = %self.command,
            user_id = self.user_id.as_deref().unwrap_or("-"),
            received_at = %self.started_at.to_rfc3339()
        );
    }

    pub fn mark_status(&mut self, status: &'static str, detail: Option<String>) {
        self.status = status;
        self.detail = detail;
    }

    pub fn log_completed(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        info!(
            target: TIMING_TARGET,
            event = "command_completed",
            command = %self.command,
            user_id = self.user_id.as_deref().unwrap_or("-"),
            started_at = %self.started_at.to_rfc3339(),
            completed_at = %Utc::now().to_rfc3339(),
            duration_s = self.started_perf.elapsed().as_secs_f64(),
            status = self.status,
            detail = self.detail.as_deref().unwrap_or("")
        );
    }
}

impl Drop for CommandTimer {
    fn drop(&mut self) {
        self.log_completed();
    }
}

pub fn start_command_timer(command: &str, user_id: Option<&str>) -> CommandTimer {
    let timer = CommandTimer::new(command, user_id);
    timer.log_received();
    timer
}

pub fn complete_command_timer(
    timer: &mut CommandTimer,
    status: &'static str,
    detail: Option<String>,
) {
    timer.mark_status(status, detail);
    timer.log_completed();
}

/// Wraps one model call with `llm_request`/`llm_response` timing events.
pub async fn log_llm_timing<T, E, F, Fut>(
    provider: &str,
    model: &str,
    operation: &str,
    metadata: Option<JsonValue>,
    call: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let metadata = metadata.unwrap_or_else(|| JsonValue::Object(Default::default()));
    let started_perf = Instant::now();
    info!(
        target: TIMING_TARGET,
        event = "llm_request",
        provider,
        model,
        operation,
        started_at = %Utc::now().to_rfc3339(),
        metadata = %metadata
    );

    let result = call().await;
    let status = if result.is_ok() { "success" } else { "error" };

    info!(
        target: TIMING_TARGET,
        event = "llm_response",
        provider,
        model,
        operation,
        completed_at = %Utc::now().to_rfc3339(),
        duration_s = started_perf.elapsed().as_secs_f64(),
        status,
        metadata = %metadata
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_through_the_call_result() {
        let ok: Result<u32, String> =
            log_llm_timing("gemini", "model", "apply_style", None, || async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));

        let err: Result<u32, String> = log_llm_timing(
            "gemini",
            "model",
            "apply_style",
            Some(serde_json::json!({ "hairstyle": "Afro" })),
            || async { Err("quota".to_string()) },
        )
        .await;
        assert_eq!(err, Err("quota".to_string()));
    }

    #[test]
    fn completion_is_logged_once() {
        let mut timer = start_command_timer("style", Some("user-1"));
        complete_command_timer(&mut timer, "error", Some("no image".to_string()));
        assert!(timer.completed);
        timer.log_completed();
        assert_eq!(timer.status, "error");
        assert_eq!(timer.detail.as_deref(), Some("no image"));
    }
}
