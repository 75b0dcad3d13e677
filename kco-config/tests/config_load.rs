use kco_config::SettingsLoader;
use serial_test::serial;

#[test]
#[serial]
fn test_config_load() {
    let settings = temp_env::with_vars(
        [
            ("KCO_WATCH_NAMESPACE", Some("ops")),
            ("KCO_DEFAULT_RATE_LIMIT_RPM", Some("120")),
            ("KCO_METRICS_PORT", Some("9191")),
        ],
        || SettingsLoader::new().load(),
    )
    .expect("load operator settings");

    assert_eq!(settings.watch_namespace, "ops");
    assert_eq!(settings.default_rate_limit_rpm, 120);
    assert_eq!(settings.metrics_port, 9191);
}

#[test]
#[serial]
fn test_config_load_defaults_when_env_absent() {
    let settings = temp_env::with_vars(
        Vec::<(&str, Option<&str>)>::new(),
        || SettingsLoader::new().load(),
    )
    .expect("load operator settings with defaults");

    assert_eq!(settings.watch_namespace, "");
    assert_eq!(settings.default_rate_limit_rpm, 60);
    assert_eq!(settings.log_format, "text");
}
