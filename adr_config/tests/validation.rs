use adr_config::{ChannelPolicy, FeedbackChannel, load_toml};
use rstest::rstest;

#[test]
fn defaults_parse_and_validate() {
    let cfg = load_toml("").expect("empty TOML uses defaults");
    cfg.validate().expect("default config should pass");
    assert_eq!(cfg.limits.current_a, 9.0);
    assert_eq!(cfg.cycle.period_ms, 1000);
    assert_eq!(cfg.regulate.feedback_channel, FeedbackChannel::Faa);
}

#[test]
fn rejects_cycle_period_below_sensor_interval() {
    let toml = r#"
[cycle]
period_ms = 500
min_sample_interval_ms = 1000
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject fast cycle");
    assert!(format!("{err}").contains("period_ms"));
}

#[test]
fn accepts_slower_cycle_than_sensor_interval() {
    let toml = r#"
[cycle]
period_ms = 2000
min_sample_interval_ms = 1000
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
}

#[rstest]
#[case("current_a")]
#[case("voltage_v")]
#[case("magnet_voltage_v")]
#[case("mag_up_step_v")]
#[case("dvdt_v_per_s")]
fn rejects_non_positive_limits(#[case] key: &str) {
    let toml = format!("[limits]\n{key} = 0.0\n");
    let cfg = load_toml(&toml).expect("parse TOML");
    let err = cfg.validate().expect_err("zero limit must fail");
    assert!(format!("{err}").contains(key), "error should name {key}");
}

#[test]
fn rejects_step_at_or_above_voltage_ceiling() {
    let toml = r#"
[limits]
voltage_v = 3.0
mag_up_step_v = 3.0
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect_err("step == ceiling must fail");
}

#[test]
fn rejects_negative_kd() {
    let toml = "[regulate]\nkd = -0.1\n";
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("negative kd must fail");
    assert!(format!("{err}").contains("regulate.kd"));
}

#[test]
fn parses_channel_policy_names() {
    let toml = "[regulate]\nchannels = \"alternate\"\n";
    let cfg = load_toml(toml).expect("parse TOML");
    assert_eq!(cfg.regulate.channels, ChannelPolicy::Alternate);

    let bad = "[regulate]\nchannels = \"both\"\n";
    assert!(load_toml(bad).is_err(), "unknown policy must not parse");
}

#[test]
fn rejects_zero_io_timeout() {
    let toml = "[timeouts]\nio_ms = 0\n";
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("zero io_ms must fail");
    assert!(format!("{err}").contains("io_ms"));
}
