use super::*;

#[test]
fn test_defaults() {
    let cfg = Config::default();
    assert_eq!(cfg.api.port, 3000);
    assert_eq!(cfg.api.host, "127.0.0.1");
    assert!(cfg.api.api_key.is_empty());
    assert_eq!(cfg.supervisor.reconnect_delay(), Duration::from_secs(5));
    assert!(!cfg.supervisor.restore_on_start);
    assert_eq!(cfg.uploads.max_image_bytes, 5 * 1024 * 1024);
    assert_eq!(cfg.hive.log_level, "info");
}

#[test]
fn test_partial_toml_fills_defaults() {
    let toml_str = r#"
        [api]
        port = 8080

        [supervisor]
        reconnect_delay_secs = 2
    "#;
    let cfg: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(cfg.api.port, 8080);
    assert_eq!(cfg.api.host, "127.0.0.1");
    assert_eq!(cfg.supervisor.reconnect_delay_secs, 2);
    assert_eq!(cfg.uploads.max_image_bytes, 5 * 1024 * 1024);
    assert_eq!(cfg.hive.data_dir, "~/.hive");
}

#[test]
fn test_empty_toml_is_valid() {
    let cfg: Config = toml::from_str("").unwrap();
    assert_eq!(cfg.api.port, 3000);
}

#[test]
fn test_layout_dirs_hang_off_data_dir() {
    let hive = HiveConfig {
        data_dir: "/srv/hive".to_string(),
        ..Default::default()
    };
    assert_eq!(hive.sessions_dir(), PathBuf::from("/srv/hive/sessions"));
    assert_eq!(hive.uploads_dir(), PathBuf::from("/srv/hive/uploads"));
    assert_eq!(hive.public_dir(), PathBuf::from("/srv/hive/public"));
    assert_eq!(hive.logs_dir(), PathBuf::from("/srv/hive/logs"));
}

#[test]
fn test_port_override() {
    let cfg = Config::default().with_port_override(Some("4100")).unwrap();
    assert_eq!(cfg.api.port, 4100);

    let cfg = Config::default().with_port_override(None).unwrap();
    assert_eq!(cfg.api.port, 3000);

    let cfg = Config::default().with_port_override(Some("  ")).unwrap();
    assert_eq!(cfg.api.port, 3000);

    assert!(Config::default()
        .with_port_override(Some("not-a-port"))
        .is_err());
}

#[test]
fn test_shellexpand_leaves_absolute_paths() {
    assert_eq!(shellexpand("/tmp/x"), "/tmp/x");
    assert_eq!(shellexpand("relative/x"), "relative/x");
}

#[test]
fn test_load_missing_file_uses_defaults() {
    let cfg = load("/nonexistent/__hive_config__.toml").unwrap();
    assert_eq!(cfg.api.port, 3000);
}

#[test]
fn test_load_rejects_malformed_file() {
    let tmp = std::env::temp_dir().join("__hive_test_bad_config__.toml");
    std::fs::write(&tmp, "[api\nport = ").unwrap();
    let err = load(tmp.to_str().unwrap()).unwrap_err();
    assert!(err.to_string().contains("failed to parse config"));
    let _ = std::fs::remove_file(&tmp);
}
