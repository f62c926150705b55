use spotmapper_settings::{Config, ConfigError, SettingsError};
use std::path::PathBuf;

#[test]
fn test_toml_and_json_files_load_back() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.scan.chip_settle_ms = 250;
    config.stage.abort_grace_ms = 2_000;
    config.output.directory = PathBuf::from("/data/scans");

    for name in ["rig.toml", "rig.json"] {
        let path = dir.path().join(name);
        config.save_to_file(&path).unwrap();
        assert_eq!(Config::load_from_file(&path).unwrap(), config);
    }
}

#[test]
fn test_partial_toml_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rig.toml");
    std::fs::write(
        &path,
        r#"
[output]
directory = "/data/scans"
"#,
    )
    .unwrap();

    let config = Config::load_from_file(&path).unwrap();
    assert_eq!(config.output.directory, PathBuf::from("/data/scans"));
    assert_eq!(config.stage, Config::default().stage);
    assert_eq!(config.scan.cell_steps, 36_000);
    assert!(config.stage.x.inverted);
    assert_eq!(config.stage.z.steps_per_mm, None);
}

#[test]
fn test_invalid_values_refused_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rig.json");
    let mut value = serde_json::to_value(Config::default()).unwrap();
    value["scan"]["cell_steps"] = serde_json::json!(0);
    std::fs::write(&path, value.to_string()).unwrap();

    let err = Config::load_from_file(&path).unwrap_err();
    assert!(matches!(
        err,
        SettingsError::Config(ConfigError::Invalid { ref section, .. }) if section == "scan"
    ));
}

#[test]
fn test_missing_file_is_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, SettingsError::Read { .. }));
}

#[test]
fn test_malformed_toml_is_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rig.toml");
    std::fs::write(&path, "[stage\nx = ").unwrap();
    assert!(matches!(
        Config::load_from_file(&path).unwrap_err(),
        SettingsError::TomlError(_)
    ));
}

#[test]
fn test_explicit_path_wins_over_default_location() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("rig.toml");
    let mut config = Config::default();
    config.stitch.program = "/opt/magick".to_string();
    config.save_to_file(&path).unwrap();

    let loaded = Config::load_or_default(Some(&path)).unwrap();
    assert_eq!(loaded.stitch.program, "/opt/magick");
}
