//! Configuration file loading tests.

use desk_common::config::{ConfigError, ConfigLoader, DeskConfig, LogLevel};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn missing_file_reports_not_found() {
    let result = DeskConfig::load(Path::new("/nonexistent/desk.toml"));
    assert!(matches!(result, Err(ConfigError::FileNotFound)));
}

#[test]
fn invalid_toml_reports_parse_error() {
    let file = write_config("deviation = {{{{");
    let result = DeskConfig::load(file.path());
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

#[test]
fn no_path_yields_defaults() {
    let config = DeskConfig::load_or_default(None).unwrap();
    assert_eq!(config, DeskConfig::default());
}

#[test]
fn full_file_overrides_sections() {
    let file = write_config(
        r#"log_level = "debug"

[deviation]
hard = 2000
soft = 800
stop_recovery = 150

[bus]
left_address = 0x10
right_address = 0x11
timeout_ms = 5

[timing]
cycle_time_ms = 20
power_step_dwell_ms = 50

[sequencing]
assume_brakes_unlocked = true
max_action_retries = 3

[gearbox]
max_steps = 100000
"#,
    );

    let config = DeskConfig::load_or_default(Some(file.path())).unwrap();
    assert_eq!(config.log_level, LogLevel::Debug);
    assert_eq!(config.deviation.hard, 2000);
    assert_eq!(config.deviation.stop_recovery, 150);
    assert_eq!(config.bus.left_address, 0x10);
    assert_eq!(config.bus.timeout_ms, 5);
    assert_eq!(config.timing.cycle_time_ms, 20);
    assert_eq!(config.timing.power_step_dwell_ms, 50);
    assert!(config.sequencing.assume_brakes_unlocked);
    assert!(!config.sequencing.assume_brakes_locked);
    assert_eq!(config.sequencing.max_action_retries, 3);
    assert_eq!(config.gearbox.max_steps, 100_000);
}

#[test]
fn inverted_limits_fail_validation() {
    let file = write_config("[deviation]\nhard = 300\nsoft = 400\n");
    let result = DeskConfig::load_or_default(Some(file.path()));
    match result {
        Err(ConfigError::ValidationError(msg)) => {
            assert_eq!(msg, "deviation.hard (300) must exceed deviation.soft (400)");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn move_to_target_outside_range_fails_validation() {
    let file = write_config("[gearbox]\nmax_steps = 1000\n");
    let result = DeskConfig::load_or_default(Some(file.path()));
    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
}

#[test]
fn shipped_config_matches_defaults() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/desk.toml");
    let config = DeskConfig::load_or_default(Some(&path)).unwrap();
    assert_eq!(config, DeskConfig::default());
}
