use clap::Parser;
use dvcscraper_cli::{cli::Cli, commands, config, logging};
use tracing::error;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let config = match config::scraper_config(&cli) {
		Ok(config) => config,
		Err(err) => {
			error!(target = "dvc", error = %err, "configuration error");
			std::process::exit(2);
		}
	};

	if let Err(err) = commands::dispatch(cli.command, config).await {
		error!(target = "dvc", error = %err, "command failed");
		std::process::exit(1);
	}
}
