//! Layered configuration: built-in defaults, then an optional JSON file, then environment variables.
//! Command-line flags are applied on top by the binary.

use std::{
	fs,
	path::{Path, PathBuf},
	time::Duration,
};

use serde::Deserialize;

use crate::{broadcast, guard};

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "RODEO_CONFIG";

/// Configuration file looked up in the working directory when [`CONFIG_ENV`] is unset
pub const CONFIG_FILE: &str = "rodeo.config.json";

/// Environment variable overriding [`RodeoConfig::listen_addr`]
pub const LISTEN_ADDR_ENV: &str = "RODEO_LISTEN_ADDR";

/// Environment variable overriding [`RodeoConfig::history_path`]
pub const HISTORY_PATH_ENV: &str = "RODEO_HISTORY_PATH";

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[non_exhaustive]
pub struct RodeoConfig {
	/// Socket address the HTTP server binds to
	pub listen_addr: String,

	/// Roll history file; `null` keeps history in memory only
	pub history_path: Option<PathBuf>,

	/// Maximum total dice an expression may declare
	pub max_dice: u64,

	/// Maximum expression length in bytes
	pub max_expression_len: usize,

	/// Retries after a failed history append
	pub history_retries: u32,

	/// Delay before the first history retry, in milliseconds
	pub retry_backoff_ms: u64,

	/// Events buffered per room for slow subscribers
	pub room_capacity: usize,

	/// Maximum request body size in bytes
	pub max_body_bytes: usize,
}

impl Default for RodeoConfig {
	fn default() -> Self {
		Self {
			listen_addr: "127.0.0.1:4000".to_owned(),
			history_path: Some(PathBuf::from("data/roll_history.jsonl")),
			max_dice: guard::DEFAULT_MAX_DICE,
			max_expression_len: guard::DEFAULT_MAX_LEN,
			history_retries: 3,
			retry_backoff_ms: 25,
			room_capacity: broadcast::DEFAULT_CAPACITY,
			max_body_bytes: 64 * 1024,
		}
	}
}

impl RodeoConfig {
	/// Loads the configuration file named by [`CONFIG_ENV`], or [`CONFIG_FILE`] in the working directory if it
	/// exists, falling back to defaults. Environment overrides are applied afterwards.
	///
	/// # Errors
	/// If a configuration file exists but can't be read or parsed, an error variant is returned.
	pub fn load() -> Result<Self, ConfigError> {
		let mut cfg = if let Ok(path) = std::env::var(CONFIG_ENV) {
			Self::load_from_path(Path::new(&path))?
		} else {
			let path = Path::new(CONFIG_FILE);
			if path.exists() {
				Self::load_from_path(path)?
			} else {
				Self::default()
			}
		};
		cfg.apply_env(|key| std::env::var(key).ok());
		Ok(cfg)
	}

	/// Loads a configuration file. Missing fields take their defaults.
	///
	/// # Errors
	/// If the file can't be read or parsed, an error variant is returned.
	pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
		let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
			path: path.to_path_buf(),
			source,
		})?;
		Self::from_json(&raw).map_err(|source| ConfigError::Parse {
			path: path.to_path_buf(),
			source,
		})
	}

	/// Parses a configuration from JSON text.
	///
	/// # Errors
	/// If the text isn't a valid configuration, an error is returned.
	pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
		serde_json::from_str(raw)
	}

	/// Applies overrides from a variable lookup. An empty history path disables the history file.
	pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
		if let Some(addr) = lookup(LISTEN_ADDR_ENV).filter(|addr| !addr.is_empty()) {
			self.listen_addr = addr;
		}
		if let Some(path) = lookup(HISTORY_PATH_ENV) {
			self.history_path = (!path.is_empty()).then(|| PathBuf::from(path));
		}
	}

	/// The guard described by this configuration.
	#[must_use]
	pub const fn guard(&self) -> guard::Guard {
		guard::Guard::new(self.max_dice, self.max_expression_len)
	}

	/// Delay before the first history retry.
	#[must_use]
	pub const fn retry_backoff(&self) -> Duration {
		Duration::from_millis(self.retry_backoff_ms)
	}
}

/// Errors loading a configuration file
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
	/// The file could not be read.
	#[error("failed to read {path:?}: {source}")]
	Read {
		/// File that was being read
		path: PathBuf,

		/// Underlying error
		#[source]
		source: std::io::Error,
	},

	/// The file is not a valid configuration.
	#[error("invalid configuration in {path:?}: {source}")]
	Parse {
		/// File that was being parsed
		path: PathBuf,

		/// Underlying error
		#[source]
		source: serde_json::Error,
	},
}
