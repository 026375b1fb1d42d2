pub mod config;
pub mod demo;

use serde::Serialize;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    // CommandOutcome is all strings; serialization cannot realistically fail.
    serde_json::to_string(&payload).unwrap_or_else(|_| {
        r#"{"command":"unknown","status":"error","error_class":"serialization","message":"payload could not be serialized"}"#
            .to_string()
    })
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::CommandResult;

    #[test]
    fn success_payload_omits_the_error_class() {
        let result = CommandResult::success("demo", "done");
        let payload: Value = serde_json::from_str(&result.output).expect("payload");
        assert_eq!(payload["status"], "ok");
        assert!(payload.get("error_class").is_none());
        assert_eq!(result.exit_code, 0);
    }

    #[test]
    fn failure_payload_carries_class_and_exit_code() {
        let result = CommandResult::failure("demo", "llm_client", "no endpoint", 2);
        let payload: Value = serde_json::from_str(&result.output).expect("payload");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "llm_client");
        assert_eq!(result.exit_code, 2);
    }
}
