#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use sinalive_client_core::{load_client_config, load_client_config_from_path};
use sinalive_platform::sina::{SinaClient, check_live_page_url};
use tracing::{error, info};

fn usage_and_exit(code: i32) -> ! {
	eprintln!(
		"Usage: sinalive_stream [--config path] <live-page-url>\n\
\n\
Prints the broadcast's stream URLs to stdout, one per line.\n\
\n\
Options:\n\
	--config  Config file (default: ~/.sinalive/config.toml)\n\
	--help    Show this help\n"
	);
	std::process::exit(code)
}

fn init_tracing() {
	let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_target(false)
		.with_writer(std::io::stderr)
		.init();
}

fn parse_args() -> (Option<PathBuf>, String) {
	let mut config = None;
	let mut url = None;

	let mut it = std::env::args().skip(1);
	while let Some(arg) = it.next() {
		match arg.as_str() {
			"--help" | "-h" => usage_and_exit(0),
			"--config" => {
				let v = it.next().unwrap_or_else(|| usage_and_exit(1));
				config = Some(PathBuf::from(v));
			}
			other if other.starts_with('-') => {
				eprintln!("Unknown argument: {other}");
				usage_and_exit(1);
			}
			other => url = Some(other.to_string()),
		}
	}

	match url {
		Some(url) => (config, url),
		None => usage_and_exit(1),
	}
}

async fn run(config: Option<PathBuf>, url: String) -> anyhow::Result<()> {
	let cfg = match config {
		Some(path) => load_client_config_from_path(&path)?,
		None => load_client_config()?,
	};

	check_live_page_url(&url);

	let sina = SinaClient::new(cfg.sina_endpoints())?;
	let tvid = sina.fetch_tvid(&url).await?;
	info!(tvid = %tvid, "found broadcast");

	for stream in sina.fetch_stream_urls(&tvid).await? {
		println!("{stream}");
	}
	Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
	init_tracing();
	let (config, url) = parse_args();

	match run(config, url).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			error!("{e:#}");
			ExitCode::FAILURE
		}
	}
}
