//! Integration tests for logging system

use bridge_traits::time::LogLevel;
use core_runtime::logging::{redact_if_sensitive, redact_url, LogFormat, LoggingConfig};

#[test]
fn test_logging_configuration() {
    // Logging can only be initialized once per process, so only the builder is exercised
    let config = LoggingConfig::default()
        .with_format(LogFormat::Json)
        .with_level(LogLevel::Debug)
        .with_spans(true);

    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.level, LogLevel::Debug);
    assert!(config.enable_spans);
    assert!(config.logger_sink.is_none());
}

#[test]
fn test_signed_media_urls_are_redacted() {
    let url = "https://media.example-cdn.com/v/abc.mp4?Expires=1700000000&Signature=xyz";
    let redacted = redact_url(url);

    assert_eq!(redacted, "https://media.example-cdn.com/v/abc.mp4?[REDACTED]");
    assert!(!redacted.contains("Signature"));
}

#[test]
fn test_plain_urls_pass_through() {
    assert_eq!(
        redact_url("https://example.com/audio.mp3"),
        "https://example.com/audio.mp3"
    );
    assert_eq!(redact_url(""), "");
}

#[test]
fn test_sensitive_field_redaction() {
    assert_eq!(redact_if_sensitive("session_token", "abc"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("cookie", "a=b"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("item_id", "page-1"), "page-1");
}

#[test]
fn test_format_selection() {
    #[cfg(debug_assertions)]
    assert_eq!(LoggingConfig::default().format, LogFormat::Pretty);

    #[cfg(not(debug_assertions))]
    assert_eq!(LoggingConfig::default().format, LogFormat::Json);
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn)
        .with_filter("core_playlist=trace")
        .with_target(false)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Compact);
    assert_eq!(config.level, LogLevel::Warn);
    assert_eq!(config.filter.as_deref(), Some("core_playlist=trace"));
    assert!(!config.display_target);
    assert!(config.display_thread_info);
}
