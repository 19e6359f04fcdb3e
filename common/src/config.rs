use std::path::Path;

use serde::de::DeserializeOwned;

use crate::logging;

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
	/// The log level to use, this is a tracing env filter
	pub level: String,

	/// What logging mode we should use
	pub mode: logging::Mode,
}

impl Default for LoggingConfig {
	fn default() -> Self {
		Self {
			level: "info".to_string(),
			mode: logging::Mode::Default,
		}
	}
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
	/// The database URL to use
	pub uri: String,

	/// Upper bound of pooled connections
	pub max_connections: u32,
}

impl Default for DatabaseConfig {
	fn default() -> Self {
		Self {
			uri: "postgres://root@localhost:5432/social_dev".to_string(),
			max_connections: 10,
		}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("config file {0} not found")]
	FileNotFound(String),
	#[error("invalid config: {0}")]
	Config(#[from] ::config::ConfigError),
}

/// Separator between nested keys in environment variable names, so
/// `SOCIAL_DATABASE__URI` sets `database.uri`.
const ENV_NESTING: &str = "__";

/// Loads `C` from its serde defaults, then a TOML file, then environment
/// variables starting with `{env_prefix}_`; later sources win.
///
/// The file is `{env_prefix}_CONFIG_FILE` if set, else `config_file`, else
/// `default_file`. Only the default file may be missing.
///
/// Returns the config and the canonical path of the file that was loaded.
pub fn parse<C: DeserializeOwned>(
	env_prefix: &str,
	config_file: Option<String>,
	default_file: Option<&str>,
) -> Result<(C, Option<String>), ConfigError> {
	parse_from(env_prefix, config_file, default_file, std::env::vars())
}

pub(crate) fn parse_from<C: DeserializeOwned>(
	env_prefix: &str,
	config_file: Option<String>,
	default_file: Option<&str>,
	vars: impl IntoIterator<Item = (String, String)>,
) -> Result<(C, Option<String>), ConfigError> {
	let prefix = format!("{env_prefix}_");
	let vars = vars
		.into_iter()
		.filter(|(key, _)| key.starts_with(&prefix))
		.collect::<::config::Map<_, _>>();

	let named = vars.get(&format!("{prefix}CONFIG_FILE")).cloned().or(config_file);
	let required = named.is_some();

	let mut builder = ::config::Config::builder();
	let mut config_path = None;

	if let Some(path) = named.or_else(|| default_file.map(str::to_string)) {
		match locate(&path) {
			Some(location) => {
				builder = builder.add_source(::config::File::new(&location, ::config::FileFormat::Toml));
				config_path = Some(
					std::fs::canonicalize(&location)
						.map(|p| p.display().to_string())
						.unwrap_or(location),
				);
			}
			None if required => return Err(ConfigError::FileNotFound(path)),
			None => tracing::debug!(path = %path, "config file not found, skipping"),
		}
	}

	// values stay strings here, serde parses them into the field's type
	let env = ::config::Environment::with_prefix(env_prefix)
		.prefix_separator("_")
		.separator(ENV_NESTING)
		.source(Some(vars));

	let config = builder.add_source(env).build()?.try_deserialize()?;

	Ok((config, config_path))
}

/// `config` and `config.toml` are both accepted for a file name.
fn locate(path: &str) -> Option<String> {
	if Path::new(path).is_file() {
		return Some(path.to_string());
	}

	if Path::new(path).extension().is_none() {
		let with_extension = format!("{path}.toml");
		if Path::new(&with_extension).is_file() {
			return Some(with_extension);
		}
	}

	None
}
