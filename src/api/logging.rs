use crate::util::parse_bool_str;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;

const DEBUG_PAYLOAD_ENV: &str = "MARKPILOT_DEBUG_PAYLOAD";
const API_LOG_PATH_ENV: &str = "MARKPILOT_API_LOG_PATH";
const DEFAULT_API_LOG_PATH: &str = "/tmp/markpilot-api.log";

pub fn debug_payload_enabled() -> bool {
    std::env::var(DEBUG_PAYLOAD_ENV)
        .ok()
        .and_then(|v| parse_bool_str(&v))
        .unwrap_or(false)
}

pub fn emit_debug_payload(request_url: &str, payload: &Value) {
    let formatted_payload = serde_json::to_string_pretty(payload)
        .unwrap_or_else(|_| "<payload serialization error>".to_string());
    let message = format!(
        "MARKPILOT_API DEBUG payload_request url={request_url}\npayload:\n{formatted_payload}\n"
    );
    emit_log_message(&message);
}

/// Records a stream line that could not be decoded. Only written when payload
/// debugging is on, since lines may carry document content.
pub fn emit_stream_parse_error(line: &str, parse_error: &serde_json::Error) {
    if !debug_payload_enabled() {
        return;
    }
    let message = format!("MARKPILOT_API ERROR stream_parse_failed error={parse_error}\nline:\n{line}\n");
    emit_log_message(&message);
}

fn emit_log_message(message: &str) {
    let path = resolve_log_path();
    if let Err(error) = append_log_file(&path, message) {
        tracing::warn!(%error, path = %path, "failed to append api debug log");
    }
}

fn resolve_log_path() -> String {
    std::env::var(API_LOG_PATH_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_API_LOG_PATH.to_string())
}

fn append_log_file(path: &str, message: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(message.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_payload_enabled_accepts_true_variants() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        std::env::set_var(DEBUG_PAYLOAD_ENV, "1");
        assert!(debug_payload_enabled());
        std::env::set_var(DEBUG_PAYLOAD_ENV, "TRUE");
        assert!(debug_payload_enabled());
        std::env::remove_var(DEBUG_PAYLOAD_ENV);
        assert!(!debug_payload_enabled());
    }

    #[test]
    fn test_debug_payload_is_appended_to_configured_path() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("api.log");
        std::env::set_var(API_LOG_PATH_ENV, path.to_str().unwrap());

        emit_debug_payload("http://localhost/api/chat/stream", &serde_json::json!({"a": 1}));
        std::env::remove_var(API_LOG_PATH_ENV);

        let written = std::fs::read_to_string(&path).expect("log written");
        assert!(written.contains("payload_request url=http://localhost/api/chat/stream"));
        assert!(written.contains("\"a\": 1"));
    }
}
