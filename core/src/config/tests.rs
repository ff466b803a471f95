use std::io::Write as _;

use tempfile::tempdir;

use super::*;

use super::TEST_ENV_GUARD as ENV_GUARD;

fn write_yaml(dir: &std::path::Path, contents: &str) -> std::path::PathBuf {
    let file_path = dir.join("application.yaml");
    let mut f = std::fs::File::create(&file_path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    file_path
}

#[test]
fn loads_valid_configuration_and_exposes_application_fields() {
    let dir = tempdir().unwrap();
    write_yaml(
        dir.path(),
        r#"
application:
  name: lynx-demo
  version: "1.2.3"
  host: 0.0.0.0
"#,
    );

    let handle = load_bootstrap_config(dir.path()).expect("config should load");
    assert_eq!(handle.name(), "lynx-demo");
    assert_eq!(handle.version(), "1.2.3");
    assert_eq!(handle.host(), "0.0.0.0");
    handle.close();
    assert!(handle.is_closed());
}

#[test]
fn rejects_missing_application_name() {
    let dir = tempdir().unwrap();
    write_yaml(
        dir.path(),
        r#"
application:
  version: "1.0.0"
"#,
    );

    let err = load_bootstrap_config(dir.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(ref msg) if msg.contains("application.name")));
}

#[test]
fn rejects_missing_application_version() {
    let dir = tempdir().unwrap();
    write_yaml(
        dir.path(),
        r#"
application:
  name: lynx-demo
"#,
    );

    let err = load_bootstrap_config(dir.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(ref msg) if msg.contains("application.version")));
}

#[test]
fn environment_overlay_takes_precedence_over_file() {
    let _guard = ENV_GUARD.lock().unwrap();
    let dir = tempdir().unwrap();
    write_yaml(
        dir.path(),
        r#"
application:
  name: lynx-demo
  version: "1.0.0"
  host: localhost
"#,
    );

    std::env::set_var("LYNX__APPLICATION__HOST", "10.0.0.5");
    let handle = load_bootstrap_config(dir.path()).expect("config should load");
    std::env::remove_var("LYNX__APPLICATION__HOST");

    assert_eq!(handle.host(), "10.0.0.5");
}

#[test]
fn bind_or_default_falls_back_when_prefix_absent() {
    #[derive(serde::Deserialize, Default, PartialEq, Debug)]
    struct PluginCfg {
        #[serde(default)]
        enabled: bool,
    }

    let dir = tempdir().unwrap();
    write_yaml(
        dir.path(),
        r#"
application:
  name: lynx-demo
  version: "1.0.0"
"#,
    );

    let handle = load_bootstrap_config(dir.path()).expect("config should load");
    let cfg: PluginCfg = handle.bind_or_default("plugins.not_configured").unwrap();
    assert_eq!(cfg, PluginCfg::default());
}

#[test]
fn config_path_manager_resolution_precedence() {
    let _guard = ENV_GUARD.lock().unwrap();
    let manager = ConfigPathManager::global();
    manager.reset();
    std::env::remove_var(CONFIG_PATH_ENV_VAR);

    assert!(!manager.is_config_path_set());
    assert_eq!(resolve_config_path().unwrap(), std::path::PathBuf::from(DEFAULT_CONFIG_PATH));

    std::env::set_var(CONFIG_PATH_ENV_VAR, "/tmp/from-env");
    assert_eq!(resolve_config_path().unwrap(), std::path::PathBuf::from("/tmp/from-env"));

    manager.set_config_path("/tmp/from-flag");
    assert!(manager.is_config_path_set());
    assert_eq!(resolve_config_path().unwrap(), std::path::PathBuf::from("/tmp/from-flag"));

    std::env::remove_var(CONFIG_PATH_ENV_VAR);
    manager.reset();
}
