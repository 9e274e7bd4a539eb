use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "dvcscraper")]
#[command(about = "Scrape the DVC member site through a persistent authenticated session")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Session cookie file carried across runs
	#[arg(
		long,
		global = true,
		value_name = "FILE",
		default_value = ".dvcscraper-session.json"
	)]
	pub session: PathBuf,

	/// Browser binary (otherwise discovered from well-known names)
	#[arg(long, global = true, value_name = "PATH")]
	pub browser: Option<PathBuf>,

	/// Run the browser with a visible window
	#[arg(long, global = true)]
	pub headful: bool,

	/// Directory for diagnostic snapshots
	#[arg(long, global = true, value_name = "DIR", default_value = ".")]
	pub snapshots: PathBuf,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Navigate to the member dashboard and capture a screenshot
	#[command(alias = "home")]
	Dashboard {
		/// Output file path
		#[arg(short, long, default_value = "dashboard.png")]
		output: PathBuf,
	},

	/// Scrape current purchase pricing for new contracts
	Prices {
		/// Emit JSON instead of a table
		#[arg(long)]
		json: bool,
	},

	/// Query calendar availability for a resort and room type
	#[command(alias = "avail")]
	Availability {
		/// Resort code (e.g. BLT)
		#[arg(long)]
		resort: String,

		/// Room type code (e.g. 4O)
		#[arg(long = "room-type")]
		room_type: String,

		/// Check-in date (YYYY-MM-DD)
		#[arg(long)]
		start: String,

		/// Check-out date (YYYY-MM-DD)
		#[arg(long)]
		end: String,

		/// Emit JSON instead of a table
		#[arg(long)]
		json: bool,
	},
}
