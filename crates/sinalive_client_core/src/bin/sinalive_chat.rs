#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use sinalive_client_core::{
	ClientConfig, HttpTransport, QueryFailurePolicy, SessionParams, establish_session, load_client_config,
	load_client_config_from_path,
};
use sinalive_platform::generate_user_key;
use sinalive_platform::sina::{SinaClient, check_live_page_url};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const USAGE: &str = "Usage: sinalive_chat [--config path] [--query-failure fatal|warn] <live-page-url>\n\
\n\
Options:\n\
	--config         Config file (default: ~/.sinalive/config.toml)\n\
	--query-failure  What to do when the room query is rejected (default: fatal)\n\
	--help           Show this help\n\
\n\
Chat lines are written to stdout, one per line. Logs go to stderr (RUST_LOG).\n\
\n\
Examples:\n\
	sinalive_chat http://kan.sina.com.cn/u/1234567890\n\
	sinalive_chat --query-failure warn http://www.kanyouxi.com/u/1234567890\n";

struct Args {
	config: Option<PathBuf>,
	query_failure: Option<QueryFailurePolicy>,
	url: String,
}

fn usage_and_exit(code: i32) -> ! {
	eprint!("{USAGE}");
	std::process::exit(code)
}

fn init_tracing() {
	let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,sinalive_client_core=debug".to_string());
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_target(false)
		.with_writer(std::io::stderr)
		.init();
}

fn parse_args() -> Args {
	let mut config = None;
	let mut query_failure = None;
	let mut url: Option<String> = None;

	let mut it = std::env::args().skip(1);
	while let Some(arg) = it.next() {
		match arg.as_str() {
			"--help" | "-h" => usage_and_exit(0),
			"--config" => {
				let v = it.next().unwrap_or_else(|| usage_and_exit(1));
				if v.trim().is_empty() {
					eprintln!("--config must be non-empty");
					usage_and_exit(1);
				}
				config = Some(PathBuf::from(v));
			}
			"--query-failure" => {
				let v = it.next().unwrap_or_else(|| usage_and_exit(1));
				let policy = v.parse::<QueryFailurePolicy>().unwrap_or_else(|e| {
					eprintln!("{e}");
					usage_and_exit(1)
				});
				query_failure = Some(policy);
			}
			other if other.starts_with('-') => {
				eprintln!("Unknown argument: {other}");
				usage_and_exit(1);
			}
			other => {
				if url.is_some() {
					eprintln!("Only one live page URL may be given");
					usage_and_exit(1);
				}
				url = Some(other.to_string());
			}
		}
	}

	let Some(url) = url else {
		usage_and_exit(1);
	};

	Args {
		config,
		query_failure,
		url,
	}
}

fn load_config(args: &Args) -> anyhow::Result<ClientConfig> {
	let mut cfg = match &args.config {
		Some(path) => load_client_config_from_path(path)?,
		None => load_client_config()?,
	};
	if let Some(policy) = args.query_failure {
		cfg.query_failure = policy;
	}
	Ok(cfg)
}

async fn run(args: Args, cancel: CancellationToken) -> anyhow::Result<()> {
	let cfg = load_config(&args)?;

	check_live_page_url(&args.url);

	let sina = SinaClient::new(cfg.sina_endpoints())?;
	let room_id = sina.fetch_chatroom_id(&args.url).await?;
	info!(room_id = %room_id, "found chat room");

	let user_key = generate_user_key();
	let server = sina.resolve_chat_server(&room_id, &user_key).await?;
	info!(server = %server.server, channel = %server.channel, "connecting to {}@{}", server.server, server.channel);

	let transport = HttpTransport::new(&server.server, &cfg.user_agent, cfg.connect_timeout)
		.with_context(|| format!("chat server {}", server.server))?;
	let params = SessionParams {
		channel: server.channel,
		auth_token: server.token,
		user_key,
	};
	let session = establish_session(transport, &params, cfg.query_failure).await?;

	let stdout = std::io::stdout();
	let mut out = stdout.lock();
	session.run_poll_loop(&cancel, &mut out).await?;
	Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
	init_tracing();
	let args = parse_args();

	let cancel = CancellationToken::new();
	let ctrl_c_cancel = cancel.clone();
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_err() {
			return;
		}
		warn!("interrupt received; stopping after the current poll (press Ctrl-C again to quit now)");
		ctrl_c_cancel.cancel();
		if tokio::signal::ctrl_c().await.is_ok() {
			std::process::exit(130);
		}
	});

	// The poll loop only returns cleanly after an interrupt.
	match run(args, cancel).await {
		Ok(()) => ExitCode::from(130),
		Err(e) => {
			error!("{e:#}");
			ExitCode::FAILURE
		}
	}
}
