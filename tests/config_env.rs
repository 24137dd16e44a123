use ferrous_injector::{
    ConfigSource, ConfigValue, DiError, EnvironmentConfigSource, InjectorOpts, RootScope,
};
use serial_test::serial;
use std::env;
use std::time::Duration;

const KEYS: [&str; 3] = [
    "DI_HEALTHCHECK_PARALLELISM",
    "DI_HEALTHCHECK_TIMEOUT_MS",
    "DI_INVOCATION_HISTORY",
];

fn clear() {
    for key in KEYS {
        env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_defaults_without_environment() {
    clear();
    let opts = InjectorOpts::from_env().unwrap();
    assert_eq!(opts.health_check_parallelism(), 0);
    assert_eq!(opts.health_check_timeout(), Duration::ZERO);
    assert_eq!(opts.invocation_history(), 32);
}

#[test]
#[serial]
fn test_options_from_environment() {
    clear();
    env::set_var("DI_HEALTHCHECK_PARALLELISM", "4");
    env::set_var("DI_HEALTHCHECK_TIMEOUT_MS", " 1500 ");
    env::set_var("DI_INVOCATION_HISTORY", "0");

    let opts = InjectorOpts::from_env().unwrap();
    clear();

    assert_eq!(opts.health_check_parallelism(), 4);
    assert_eq!(opts.health_check_timeout(), Duration::from_millis(1500));
    assert_eq!(opts.invocation_history(), 0);

    let root = RootScope::with_opts(opts);
    assert_eq!(root.opts().health_check_parallelism(), 4);
}

#[test]
#[serial]
fn test_invalid_environment_value() {
    clear();
    env::set_var("DI_HEALTHCHECK_PARALLELISM", "lots");

    let result = InjectorOpts::from_env();
    clear();

    match result {
        Err(DiError::Config { key, value }) => {
            assert_eq!(key, "healthcheck_parallelism");
            assert_eq!(value, "lots");
        }
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}

#[test]
#[serial]
fn test_custom_prefix_and_keys() {
    clear();
    env::set_var("INJECTOR_TEST_INVOCATION_HISTORY", "8");

    let source = EnvironmentConfigSource::with_prefix("injector_test");
    assert_eq!(source.get("invocation_history"), Some(ConfigValue::Integer(8)));
    assert!(source.keys().contains(&"invocation_history".to_string()));

    let opts = InjectorOpts::from_source(&source).unwrap();
    env::remove_var("INJECTOR_TEST_INVOCATION_HISTORY");
    assert_eq!(opts.invocation_history(), 8);
}
