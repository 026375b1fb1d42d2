use secrecy::ExposeSecret;

use overseer_core::config::AppConfig;

/// Renders the effective configuration, one `key = value` line per field.
/// The API key is always redacted.
pub fn run(config: &AppConfig) -> String {
    let mut lines =
        vec!["effective config (source precedence: overrides > env > file > default):".to_string()];

    lines.push(render_line("llm.base_url", &config.llm.base_url));
    lines.push(render_line("llm.model", &config.llm.model));
    let api_key = match &config.llm.api_key {
        Some(key) => redact_token(key.expose_secret()),
        None => "(unset)".to_string(),
    };
    lines.push(render_line("llm.api_key", &api_key));
    lines.push(render_line("llm.timeout_secs", &config.llm.timeout_secs.to_string()));

    let report_path = config
        .report
        .path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "(unset)".to_string());
    lines.push(render_line("report.path", &report_path));

    let max_records = config
        .history
        .max_records
        .map(|cap| cap.to_string())
        .unwrap_or_else(|| "(unbounded)".to_string());
    lines.push(render_line("history.max_records", &max_records));

    lines.push(render_line("logging.level", &config.logging.level));
    lines.push(render_line("logging.format", &format!("{:?}", config.logging.format).to_lowercase()));

    lines.join("\n")
}

fn render_line(key: &str, value: &str) -> String {
    format!("{key} = {value}")
}

fn redact_token(token: &str) -> String {
    if token.chars().count() <= 4 {
        return "****".to_string();
    }
    let prefix: String = token.chars().take(4).collect();
    format!("{prefix}****")
}

#[cfg(test)]
mod tests {
    use overseer_core::config::AppConfig;

    use super::{redact_token, run};

    #[test]
    fn api_key_is_redacted() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("sk-super-secret".to_owned().into());
        let output = run(&config);
        assert!(!output.contains("sk-super-secret"));
        assert!(output.contains("sk-s****"));
    }

    #[test]
    fn short_tokens_redact_fully() {
        assert_eq!(redact_token("abc"), "****");
    }

    #[test]
    fn multi_byte_keys_redact_without_panicking() {
        assert_eq!(redact_token("€€secret"), "€€se****");

        let mut config = AppConfig::default();
        config.llm.api_key = Some("€€secret".to_owned().into());
        let output = run(&config);
        assert!(!output.contains("€€secret"));
        assert!(output.contains("€€se****"));
    }

    #[test]
    fn unset_fields_render_placeholders() {
        let output = run(&AppConfig::default());
        assert!(output.contains("llm.api_key = (unset)"));
        assert!(output.contains("history.max_records = (unbounded)"));
    }
}
