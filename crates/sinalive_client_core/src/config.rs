#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, anyhow};
use serde::Deserialize;
use sinalive_platform::USER_AGENT;
use sinalive_platform::sina::{DEFAULT_DISCOVERY_URL, DEFAULT_STREAM_API_URL, SinaEndpoints};
use tracing::{info, warn};

use crate::session::QueryFailurePolicy;

/// Default config path: `~/.sinalive/config.toml`.
pub fn default_config_path() -> anyhow::Result<PathBuf> {
	let home = dirs::home_dir().ok_or_else(|| anyhow!("could not determine home directory"))?;
	Ok(home.join(".sinalive").join("config.toml"))
}

/// Load the client config from TOML and env overrides.
pub fn load_client_config() -> anyhow::Result<ClientConfig> {
	let path = default_config_path()?;
	load_client_config_from_path(&path)
}

/// Same as `load_client_config` but with an explicit config path.
pub fn load_client_config_from_path(path: &Path) -> anyhow::Result<ClientConfig> {
	let file_cfg = read_toml_if_exists(path)
		.with_context(|| format!("read config from {}", path.display()))?
		.unwrap_or_default();

	let mut cfg = ClientConfig::from_file(file_cfg);

	apply_env_overrides_from(&mut cfg, |key| std::env::var(key).ok());

	Ok(cfg)
}

/// Client config.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
	/// User-agent for every HTTP request.
	pub user_agent: String,
	/// Handling of a rejected room query batch.
	pub query_failure: QueryFailurePolicy,
	/// TCP connect timeout; requests themselves never time out.
	pub connect_timeout: Option<Duration>,
	/// Chat-server discovery endpoint.
	pub discovery_url: String,
	/// Broadcast info endpoint (`tvid` is appended).
	pub stream_api_url: String,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			user_agent: USER_AGENT.to_string(),
			query_failure: QueryFailurePolicy::default(),
			connect_timeout: None,
			discovery_url: DEFAULT_DISCOVERY_URL.to_string(),
			stream_api_url: DEFAULT_STREAM_API_URL.to_string(),
		}
	}
}

impl ClientConfig {
	pub fn sina_endpoints(&self) -> SinaEndpoints {
		SinaEndpoints {
			discovery_url: self.discovery_url.clone(),
			stream_api_url: self.stream_api_url.clone(),
			user_agent: self.user_agent.clone(),
			connect_timeout: self.connect_timeout,
		}
	}

	fn from_file(file: FileConfig) -> Self {
		let defaults = Self::default();
		Self {
			user_agent: file
				.client
				.user_agent
				.filter(|s| !s.trim().is_empty())
				.unwrap_or(defaults.user_agent),
			query_failure: file.client.query_failure.unwrap_or_default(),
			connect_timeout: file
				.client
				.connect_timeout_ms
				.filter(|ms| *ms > 0)
				.map(Duration::from_millis),
			discovery_url: file
				.sina
				.discovery_url
				.filter(|s| !s.trim().is_empty())
				.unwrap_or(defaults.discovery_url),
			stream_api_url: file
				.sina
				.stream_api_url
				.filter(|s| !s.trim().is_empty())
				.unwrap_or(defaults.stream_api_url),
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
	#[serde(default)]
	client: FileClientSettings,

	#[serde(default)]
	sina: FileSinaSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileClientSettings {
	user_agent: Option<String>,
	query_failure: Option<QueryFailurePolicy>,
	connect_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileSinaSettings {
	discovery_url: Option<String>,
	stream_api_url: Option<String>,
}

fn read_toml_if_exists(path: &Path) -> anyhow::Result<Option<FileConfig>> {
	match fs::read_to_string(path) {
		Ok(s) => {
			let cfg: FileConfig = toml::from_str(&s).context("parse TOML")?;
			Ok(Some(cfg))
		}
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
		Err(e) => Err(anyhow!(e).context("read config file")),
	}
}

fn non_empty(v: String) -> Option<String> {
	let v = v.trim().to_string();
	(!v.is_empty()).then_some(v)
}

/// Apply `SINALIVE_*` overrides, reading variables through `lookup`.
pub fn apply_env_overrides_from<F>(cfg: &mut ClientConfig, lookup: F)
where
	F: Fn(&str) -> Option<String>,
{
	if let Some(v) = lookup("SINALIVE_USER_AGENT").and_then(non_empty) {
		cfg.user_agent = v;
		info!("client config: user_agent overridden by env");
	}

	if let Some(v) = lookup("SINALIVE_QUERY_FAILURE").and_then(non_empty) {
		match v.parse::<QueryFailurePolicy>() {
			Ok(policy) => {
				cfg.query_failure = policy;
				info!(%policy, "client config: query_failure overridden by env");
			}
			Err(e) => warn!(error = %e, "ignoring SINALIVE_QUERY_FAILURE"),
		}
	}

	if let Some(v) = lookup("SINALIVE_CONNECT_TIMEOUT_MS")
		&& let Ok(ms) = v.trim().parse::<u64>()
	{
		cfg.connect_timeout = (ms > 0).then(|| Duration::from_millis(ms));
		info!(ms, "client config: connect_timeout overridden by env");
	}

	if let Some(v) = lookup("SINALIVE_DISCOVERY_URL").and_then(non_empty) {
		cfg.discovery_url = v;
		info!("sina config: discovery_url overridden by env");
	}

	if let Some(v) = lookup("SINALIVE_STREAM_API_URL").and_then(non_empty) {
		cfg.stream_api_url = v;
		info!("sina config: stream_api_url overridden by env");
	}
}
