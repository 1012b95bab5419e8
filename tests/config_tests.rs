use std::time::Duration;

use videometrics_lib::tracker::config::{DEFAULT_EVENT_NAME, DEFAULT_INTERVAL_SECS};
use videometrics_lib::TrackerConfig;

#[test]
fn defaults_tick_every_second_as_videometrics() {
    let config = TrackerConfig::default();
    assert_eq!(config.interval_secs, 1.0);
    assert_eq!(config.event_name, "videometrics");
    assert_eq!(config.interval(), Duration::from_secs(1));
}

#[test]
fn json_fills_missing_fields_with_defaults() {
    let config = TrackerConfig::from_json_str(r#"{ "interval_secs": 0.25 }"#).expect("parse");
    assert_eq!(config.interval_secs, 0.25);
    assert_eq!(config.event_name, DEFAULT_EVENT_NAME);
    assert_eq!(config.interval(), Duration::from_millis(250));
}

#[test]
fn json_with_invalid_values_is_sanitized() {
    let config =
        TrackerConfig::from_json_str(r#"{ "interval_secs": -2, "event_name": "  " }"#).expect("parse");
    assert_eq!(config.interval_secs, DEFAULT_INTERVAL_SECS);
    assert_eq!(config.event_name, DEFAULT_EVENT_NAME);
}

#[test]
fn malformed_json_is_an_error() {
    let err = TrackerConfig::from_json_str("interval_secs = 2").expect_err("not json");
    assert!(format!("{err}").contains("tracker config"));
}

#[test]
fn explicit_constructor_sanitizes() {
    let config = TrackerConfig::new(0.0, "engagement");
    assert_eq!(config.interval_secs, DEFAULT_INTERVAL_SECS);
    assert_eq!(config.event_name, "engagement");

    let config = TrackerConfig::new(f64::NAN, "");
    assert_eq!(config, TrackerConfig::default());
}

#[test]
fn environment_overrides_defaults() {
    std::env::set_var("VIDEOMETRICS_INTERVAL_SECS", "2.5");
    std::env::set_var("VIDEOMETRICS_EVENT_NAME", "engagement");
    let config = TrackerConfig::from_env();
    std::env::remove_var("VIDEOMETRICS_INTERVAL_SECS");
    std::env::remove_var("VIDEOMETRICS_EVENT_NAME");

    assert_eq!(config.interval_secs, 2.5);
    assert_eq!(config.event_name, "engagement");
}
