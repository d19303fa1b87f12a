use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use hearth::config::{CONFIG_ENV, Config, LISTEN_ENV};

// Tests that touch process environment variables must not interleave.
static ENV_LOCK: Mutex<()> = Mutex::new(());

#[test]
fn test_config_default_address() {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe {
        std::env::remove_var(LISTEN_ENV);
        std::env::remove_var(CONFIG_ENV);
    }
    let cfg = Config::load().unwrap();
    assert_eq!(cfg.server.listen_addr, "127.0.0.1:8080");
    assert_eq!(cfg.connection.idle_timeout(), Duration::from_secs(5));
}

#[test]
fn test_config_custom_address_from_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe {
        std::env::remove_var(CONFIG_ENV);
        std::env::set_var(LISTEN_ENV, "0.0.0.0:3000");
    }
    let cfg = Config::load().unwrap();
    unsafe {
        std::env::remove_var(LISTEN_ENV);
    }
    assert_eq!(cfg.server.listen_addr, "0.0.0.0:3000");
}

#[test]
fn test_config_file_with_env_override() {
    let _guard = ENV_LOCK.lock().unwrap();
    let path = std::env::temp_dir().join(format!("hearth-config-{}.yaml", std::process::id()));
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "server:\n  listen_addr: \"127.0.0.1:9000\"\nconnection:\n  idle_timeout_ms: 250").unwrap();
    drop(file);

    unsafe {
        std::env::set_var(CONFIG_ENV, &path);
        std::env::remove_var(LISTEN_ENV);
    }
    let from_file = Config::load().unwrap();

    unsafe {
        std::env::set_var(LISTEN_ENV, "127.0.0.1:9001");
    }
    let overridden = Config::load().unwrap();

    unsafe {
        std::env::remove_var(CONFIG_ENV);
        std::env::remove_var(LISTEN_ENV);
    }
    std::fs::remove_file(&path).unwrap();

    assert_eq!(from_file.server.listen_addr, "127.0.0.1:9000");
    assert_eq!(from_file.connection.idle_timeout(), Duration::from_millis(250));
    assert_eq!(overridden.server.listen_addr, "127.0.0.1:9001");
}

#[test]
fn test_config_missing_file_is_an_error() {
    let err = Config::from_file("/definitely/not/here.yaml").unwrap_err();
    assert!(err.to_string().contains("reading config file"));
}

#[test]
fn test_config_yaml_partial_sections_use_defaults() {
    let cfg = Config::from_yaml("connection:\n  max_pipelined: 4\n").unwrap();

    assert_eq!(cfg.server.listen_addr, "127.0.0.1:8080");
    assert_eq!(cfg.connection.max_pipelined, 4);
    assert_eq!(cfg.connection.max_header_bytes, 16 * 1024);
    assert_eq!(cfg.connection.max_body_bytes, 1024 * 1024);
}

#[test]
fn test_config_empty_yaml_is_default() {
    let cfg = Config::from_yaml("").unwrap();
    assert_eq!(cfg.connection.read_buffer_size, 8192);
}

#[test]
fn test_config_rejects_unknown_fields() {
    assert!(Config::from_yaml("server:\n  listen: \"x\"\n").is_err());
}

#[test]
fn test_config_validation() {
    let mut cfg = Config::default();
    assert!(cfg.validate().is_ok());

    cfg.connection.idle_timeout_ms = 0;
    assert!(cfg.validate().is_err());

    let mut cfg = Config::default();
    cfg.connection.max_pipelined = 0;
    assert!(cfg.validate().is_err());
}

#[test]
fn test_config_settings_conversion() {
    let cfg = Config::from_yaml(
        "connection:\n  idle_timeout_ms: 1500\n  max_header_bytes: 512\n  max_body_bytes: 64\n",
    )
    .unwrap();
    let settings = cfg.connection.settings();

    assert_eq!(settings.idle_timeout, Duration::from_millis(1500));
    assert_eq!(settings.limits.max_header_bytes, 512);
    assert_eq!(settings.limits.max_body_bytes, 64);
    assert_eq!(settings.max_pipelined, 16);
}
