use anyhow::Result;
use clap::Parser;
use common::logging;
use platform_social::config::AppConfig;
use platform_social::global::GlobalState;

#[derive(Debug, Parser)]
#[command(name = "platform-social", about = "Applies the social schema and reports its state")]
struct Args {
	/// The path to the config file
	#[arg(long, env = "SOCIAL_CONFIG_FILE")]
	config_file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
	let args = Args::parse();
	let config = AppConfig::parse(args.config_file)?;

	logging::init(&config.logging.level, config.logging.mode)?;

	if let Some(file) = &config.config_file {
		tracing::info!(file = %file, "loaded config from file");
	}

	tracing::debug!("config: {:#?}", config);

	let global = GlobalState::connect(config).await?;

	global.store.migrate().await?;
	tracing::info!("migrations applied");

	let users = global.store.active_user_count().await?;
	tracing::info!(name = %global.config.name, users, "social store ready");

	Ok(())
}
