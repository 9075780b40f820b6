//! Integration test: configuration files on disk.

use std::io::Write;

use tempfile::NamedTempFile;

use turret_common::config::{ConfigError, LogLevel};
use turret_common::control_unit::config::CenteringRule;
use turret_control_unit::config::load_config;

const TURRET_TOML: &str = r#"
[shared]
log_level = "debug"
service_name = "turret-bench"

[control]
period_ms = 20

[control.elevation]
kp = 0.8
ki = 0.02
tolerance = 6
hinge_limit = 900

[acquisition]
centering = "symmetric"
light_threshold = 25

[scheduling]
cpu_core = 3

[sim]
counts_per_second_per_duty = 4.0
"#;

fn write_config(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[test]
fn full_file_loads_and_overrides() {
    let file = write_config(TURRET_TOML);
    let loaded = load_config(Some(file.path())).unwrap();
    let turret = &loaded.turret;

    assert_eq!(turret.shared.log_level, LogLevel::Debug);
    assert_eq!(turret.shared.service_name, "turret-bench");
    assert_eq!(turret.control.period_ms, 20);
    assert_eq!(turret.control.elevation.kp, 0.8);
    assert_eq!(turret.control.elevation.hinge_limit, Some(900));
    assert_eq!(turret.control.azimuth.hinge_limit, None);
    assert_eq!(turret.acquisition.centering, CenteringRule::Symmetric);
    assert_eq!(turret.acquisition.light_threshold, 25);
    assert_eq!(turret.scheduling.cpu_core, 3);
    assert_eq!(loaded.sim.counts_per_second_per_duty, 4.0);
}

#[test]
fn missing_file_is_reported() {
    let result = load_config(Some(std::path::Path::new("/nonexistent/turret.toml")));
    assert!(matches!(result, Err(ConfigError::FileNotFound)));
}

#[test]
fn invalid_values_are_rejected() {
    let file = write_config("[trigger]\npull_cycles = 100\nsequence_cycles = 50\n");
    let err = load_config(Some(file.path())).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(ref msg) if msg.contains("pull_cycles")));
}

#[test]
fn malformed_file_is_a_parse_error() {
    let file = write_config("[control\nperiod_ms = ");
    assert!(matches!(
        load_config(Some(file.path())),
        Err(ConfigError::ParseError(_))
    ));
}
