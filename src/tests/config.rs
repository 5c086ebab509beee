use std::{collections::HashMap, path::PathBuf, time::Duration};

use crate::config::{ConfigError, RodeoConfig, HISTORY_PATH_ENV, LISTEN_ADDR_ENV};

#[test]
fn defaults() {
	let cfg = RodeoConfig::default();
	assert_eq!(cfg.listen_addr, "127.0.0.1:4000");
	assert_eq!(cfg.history_path, Some(PathBuf::from("data/roll_history.jsonl")));
	assert_eq!(cfg.max_dice, 100);
	assert_eq!(cfg.guard().max_dice(), 100);
	assert_eq!(cfg.retry_backoff(), Duration::from_millis(25));
}

#[test]
fn partial_file_keeps_defaults() {
	let cfg = RodeoConfig::from_json(r#"{ "max_dice": 20, "history_path": null }"#).unwrap();
	assert_eq!(cfg.max_dice, 20);
	assert_eq!(cfg.history_path, None);
	assert_eq!(cfg.listen_addr, RodeoConfig::default().listen_addr);
}

#[test]
fn unknown_fields_rejected() {
	assert!(RodeoConfig::from_json(r#"{ "max_dcie": 20 }"#).is_err());
}

#[test]
fn env_overrides() {
	let vars = HashMap::from([
		(LISTEN_ADDR_ENV, "0.0.0.0:8080".to_owned()),
		(HISTORY_PATH_ENV, "/tmp/rolls.jsonl".to_owned()),
	]);
	let mut cfg = RodeoConfig::default();
	cfg.apply_env(|key| vars.get(key).cloned());
	assert_eq!(cfg.listen_addr, "0.0.0.0:8080");
	assert_eq!(cfg.history_path, Some(PathBuf::from("/tmp/rolls.jsonl")));
}

#[test]
fn empty_history_env_disables_file() {
	let mut cfg = RodeoConfig::default();
	cfg.apply_env(|key| (key == HISTORY_PATH_ENV).then(String::new));
	assert_eq!(cfg.history_path, None);
	assert_eq!(cfg.listen_addr, "127.0.0.1:4000");
}

#[test]
fn load_from_file() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("rodeo.config.json");
	std::fs::write(&path, r#"{ "listen_addr": "127.0.0.1:9000", "room_capacity": 8 }"#).unwrap();

	let cfg = RodeoConfig::load_from_path(&path).unwrap();
	assert_eq!(cfg.listen_addr, "127.0.0.1:9000");
	assert_eq!(cfg.room_capacity, 8);

	std::fs::write(&path, "{ not json").unwrap();
	assert!(matches!(RodeoConfig::load_from_path(&path), Err(ConfigError::Parse { .. })));
	assert!(matches!(
		RodeoConfig::load_from_path(&dir.path().join("missing.json")),
		Err(ConfigError::Read { .. })
	));
}
