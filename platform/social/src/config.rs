use common::config::{ConfigError, DatabaseConfig, LoggingConfig};

/// Prefix of the environment variables read by [`AppConfig::parse`].
pub const ENV_PREFIX: &str = "SOCIAL";

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
/// The social graph core: follows, blocks, notifications and users
pub struct AppConfig {
	/// The path to the config file
	pub config_file: Option<String>,

	/// Name of this instance
	pub name: String,

	/// The logging config
	pub logging: LoggingConfig,

	/// Database Config
	pub database: DatabaseConfig,

	/// Registration Config
	pub registration: RegistrationConfig,
}

impl Default for AppConfig {
	fn default() -> Self {
		Self {
			config_file: Some("config".to_string()),
			name: "social".to_string(),
			logging: LoggingConfig::default(),
			database: DatabaseConfig::default(),
			registration: RegistrationConfig::default(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
	/// How long a verified email stays usable for registration, in seconds
	pub verification_ttl_secs: i64,
}

impl Default for RegistrationConfig {
	fn default() -> Self {
		Self {
			verification_ttl_secs: 30 * 60,
		}
	}
}

impl RegistrationConfig {
	pub fn verification_ttl(&self) -> chrono::Duration {
		chrono::Duration::seconds(self.verification_ttl_secs)
	}
}

impl AppConfig {
	/// Loads the config from defaults, the config file and `SOCIAL_*`
	/// environment variables. A `config_file` given here has to exist, the
	/// default one is skipped when missing.
	pub fn parse(config_file: Option<String>) -> Result<Self, ConfigError> {
		let default_file = Self::default().config_file;
		let (mut config, loaded): (Self, _) =
			common::config::parse(ENV_PREFIX, config_file, default_file.as_deref())?;

		config.config_file = loaded;

		Ok(config)
	}
}
