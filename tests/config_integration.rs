use assistant_relay::config::AppConfig;
use serial_test::serial;
use std::env;
use std::fs;

const ARGS: [&str; 1] = ["assistant-relay"];

// Helper to clear environment variables that might interfere with tests
fn clear_env_vars() {
    unsafe {
        for var in [
            "RELAY_SERVER__PORT",
            "RELAY_RESILIENCE__RATE_LIMIT_MAX",
            "CONFIG_FILE",
            "PORT",
            "HOST",
            "RATE_LIMIT_ENABLED",
            "OPENAI_API_KEY",
            "ASSISTANT_TIMEOUT_MS",
            "ASSISTANT_MAX_RETRIES",
            "CONTENT_API_BASE_URL",
        ] {
            env::remove_var(var);
        }
    }
}

#[test]
#[serial]
fn test_default_config() {
    clear_env_vars();

    let config = AppConfig::load_from_args(ARGS).expect("Failed to load config");
    assert_eq!(config.server.port, 3000);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.assistant.poll_timeout_ms, 30_000);
    assert_eq!(config.assistant.poll_interval_ms, 1_000);
    assert_eq!(config.assistant.max_retries, 3);
    assert_eq!(config.content.account_id, "1065649585");
    assert!(config.resilience.rate_limit_enabled);
    assert_eq!(config.resilience.rate_limit_max, 100);
    assert!(config.assistant.settings().api_key.is_none());
}

#[test]
#[serial]
fn test_env_override() {
    clear_env_vars();
    unsafe {
        env::set_var("RELAY_SERVER__PORT", "9090");
        env::set_var("RELAY_RESILIENCE__RATE_LIMIT_MAX", "5");
    }

    let config = AppConfig::load_from_args(ARGS).expect("Failed to load config");
    assert_eq!(config.server.port, 9090);
    assert_eq!(config.resilience.rate_limit_max, 5);

    clear_env_vars();
}

#[test]
#[serial]
fn test_plain_env_vars() {
    clear_env_vars();
    unsafe {
        env::set_var("OPENAI_API_KEY", "sk-test");
        env::set_var("ASSISTANT_TIMEOUT_MS", "5000");
        env::set_var("ASSISTANT_MAX_RETRIES", "1");
        env::set_var("PORT", "4000");
    }

    let config = AppConfig::load_from_args(ARGS).expect("Failed to load config");
    assert_eq!(config.assistant.api_key, "sk-test");
    assert_eq!(config.assistant.poll_policy().timeout.as_millis(), 5000);
    assert_eq!(config.assistant.max_retries, 1);
    assert_eq!(config.server.port, 4000);

    clear_env_vars();
}

#[test]
#[serial]
fn test_file_load() {
    clear_env_vars();

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let file_path = dir.path().join("relay.yaml");
    fs::write(
        &file_path,
        r#"
server:
  port: 7070
content:
  account_id: "42"
"#,
    )
    .expect("Failed to write temp config");

    unsafe {
        env::set_var("CONFIG_FILE", &file_path);
    }

    let config = AppConfig::load_from_args(ARGS).expect("Failed to load config from file");
    assert_eq!(config.server.port, 7070);
    assert_eq!(config.content.account_id, "42");

    clear_env_vars();
}

#[test]
#[serial]
fn test_cli_overrides_env() {
    clear_env_vars();
    unsafe {
        env::set_var("RELAY_SERVER__PORT", "9090");
    }

    let config = AppConfig::load_from_args(["assistant-relay", "--port", "5050"])
        .expect("Failed to load config");
    assert_eq!(config.server.port, 5050);

    clear_env_vars();
}
