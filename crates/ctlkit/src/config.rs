use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use config::{File, FileFormat};
use thiserror::Error;

/// Section used for keys that appear before any `[section]` header.
pub const DEFAULT_SECTION: &str = "default";

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to load config {path}: {source}")]
	Load {
		path: PathBuf,
		#[source]
		source: config::ConfigError,
	},
	#[error("config path is not valid utf-8: {0}")]
	Path(PathBuf),
}

/// Section → key → value store read from an INI file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
	sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl Config {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let name = path
			.to_str()
			.ok_or_else(|| ConfigError::Path(path.to_path_buf()))?;
		let load_err = |source: config::ConfigError| ConfigError::Load {
			path: path.to_path_buf(),
			source,
		};

		let raw = config::Config::builder()
			.add_source(File::new(name, FileFormat::Ini).required(true))
			.build()
			.map_err(load_err)?;

		let mut cfg = Config::new();
		let entries = raw
			.try_deserialize::<HashMap<String, config::Value>>()
			.map_err(load_err)?;
		for (key, value) in entries {
			match value.clone().into_table() {
				Ok(table) => {
					for (k, v) in table {
						let v = v.into_string().map_err(load_err)?;
						cfg.set(&key, k, v);
					}
				}
				Err(_) => {
					let v = value.into_string().map_err(load_err)?;
					cfg.set(DEFAULT_SECTION, key, v);
				}
			}
		}

		tracing::debug!("loaded config {} ({} sections)", path.display(), cfg.sections.len());
		Ok(cfg)
	}

	pub fn get(&self, section: &str, key: &str) -> Option<&str> {
		self.sections
			.get(section)
			.and_then(|s| s.get(key))
			.map(|v| v.as_str())
	}

	pub fn set(&mut self, section: &str, key: impl Into<String>, value: impl Into<String>) {
		self.sections
			.entry(section.to_string())
			.or_default()
			.insert(key.into(), value.into());
	}

	pub fn section(&self, name: &str) -> Option<&BTreeMap<String, String>> {
		self.sections.get(name)
	}

	pub fn sections(&self) -> impl Iterator<Item = &str> {
		self.sections.keys().map(|s| s.as_str())
	}

	pub fn is_empty(&self) -> bool {
		self.sections.is_empty()
	}
}
