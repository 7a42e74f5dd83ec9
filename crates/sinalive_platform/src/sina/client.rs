#![forbid(unsafe_code)]

use std::sync::OnceLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, anyhow};
use regex::bytes::Regex;
use serde_json::Value;
use sinalive_protocol::decode_jsonp;
use tracing::debug;
use url::Url;

use crate::{SecretString, USER_AGENT};

pub const DEFAULT_DISCOVERY_URL: &str = "http://nas.uc.sina.com.cn/webroom/";
pub const DEFAULT_STREAM_API_URL: &str = "http://kan.sina.com.cn/api/kan_2013_getinfo/tvid/";

/// Endpoints used by [`SinaClient`]; overridable for testing and mirrors.
#[derive(Debug, Clone)]
pub struct SinaEndpoints {
	pub discovery_url: String,
	pub stream_api_url: String,
	pub user_agent: String,
	pub connect_timeout: Option<Duration>,
}

impl Default for SinaEndpoints {
	fn default() -> Self {
		Self {
			discovery_url: DEFAULT_DISCOVERY_URL.to_string(),
			stream_api_url: DEFAULT_STREAM_API_URL.to_string(),
			user_agent: USER_AGENT.to_string(),
			connect_timeout: None,
		}
	}
}

/// Chat server coordinates returned by the discovery call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatServerInfo {
	/// Bayeux base URL.
	pub server: String,
	/// Room subscription channel.
	pub channel: String,
	/// One-time authentication token (`ukey`).
	pub token: SecretString,
}

#[derive(Debug, Clone)]
pub struct SinaClient {
	endpoints: SinaEndpoints,
	client: reqwest::Client,
}

impl SinaClient {
	pub fn new(endpoints: SinaEndpoints) -> anyhow::Result<Self> {
		let mut builder = reqwest::Client::builder().user_agent(endpoints.user_agent.clone());
		if let Some(timeout) = endpoints.connect_timeout {
			builder = builder.connect_timeout(timeout);
		}
		let client = builder.build().context("build sina http client")?;
		Ok(Self { endpoints, client })
	}

	async fn get_bytes(&self, url: Url, what: &str) -> anyhow::Result<Vec<u8>> {
		debug!(url = %url, "sina GET {what}");
		let resp = self
			.client
			.get(url)
			.send()
			.await
			.with_context(|| format!("sina {what}"))?;

		if !resp.status().is_success() {
			return Err(anyhow!("sina {what} failed: status={}", resp.status()));
		}

		let body = resp.bytes().await.with_context(|| format!("read sina {what} body"))?;
		Ok(body.to_vec())
	}

	/// Scrape the chat room id embedded in a live room page.
	pub async fn fetch_chatroom_id(&self, page_url: &str) -> anyhow::Result<String> {
		let body = self.get_bytes(parse_url(page_url)?, "live page").await?;
		extract_chatroom_id(&body).ok_or_else(|| anyhow!("can not extract the value chatRoomId from the web page"))
	}

	/// Resolve the Bayeux server, channel and token for a room.
	pub async fn resolve_chat_server(&self, room_id: &str, user_key: &str) -> anyhow::Result<ChatServerInfo> {
		let nonce = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map(|d| d.as_secs())
			.unwrap_or_default();
		let url = chat_server_discovery_url(&self.endpoints.discovery_url, room_id, user_key, nonce)?;
		let body = self.get_bytes(url, "chat server discovery").await?;
		parse_chat_server(&body)
	}

	/// Scrape the broadcast id (`tvid`) from a live room page.
	pub async fn fetch_tvid(&self, page_url: &str) -> anyhow::Result<String> {
		let body = self.get_bytes(parse_url(page_url)?, "live page").await?;
		extract_tvid(&body).ok_or_else(|| anyhow!("can not extract the value TVID from the web page"))
	}

	/// Stream URLs of a broadcast, in the order the API lists them.
	pub async fn fetch_stream_urls(&self, tvid: &str) -> anyhow::Result<Vec<String>> {
		let url = stream_info_url(&self.endpoints.stream_api_url, tvid, rand::random::<f64>())?;
		let body = self.get_bytes(url, "broadcast info").await?;
		parse_stream_urls(&body)
	}
}

fn chatroom_id_regex() -> &'static Regex {
	static RE: OnceLock<Regex> = OnceLock::new();
	RE.get_or_init(|| Regex::new(r"chatRoomId:'(\d+)'").expect("static chatRoomId regex"))
}

fn tvid_regex() -> &'static Regex {
	static RE: OnceLock<Regex> = OnceLock::new();
	RE.get_or_init(|| Regex::new(r"tvid=(\d+)").expect("static tvid regex"))
}

fn first_capture(re: &Regex, body: &[u8]) -> Option<String> {
	re.captures(body)
		.and_then(|caps| caps.get(1))
		.map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
}

pub fn extract_chatroom_id(html: &[u8]) -> Option<String> {
	first_capture(chatroom_id_regex(), html)
}

pub fn extract_tvid(html: &[u8]) -> Option<String> {
	first_capture(tvid_regex(), html)
}

fn parse_url(raw: &str) -> anyhow::Result<Url> {
	Url::parse(raw).with_context(|| format!("invalid url {raw}"))
}

/// Discovery request URL; `nonce` names the JSONP callback and busts caches.
pub fn chat_server_discovery_url(base: &str, room_id: &str, user_key: &str, nonce: u64) -> anyhow::Result<Url> {
	let mut url = parse_url(base)?;
	url.query_pairs_mut()
		.append_pair("type", "finance")
		.append_pair("callback", &format!("jsonp{nonce}"))
		.append_pair("roomid", room_id)
		.append_pair("ukey", user_key)
		.append_pair("_", &(nonce + 1).to_string());
	Ok(url)
}

/// Broadcast info URL: `tvid` joined onto the API path, `random` busts caches.
pub fn stream_info_url(api: &str, tvid: &str, random: f64) -> anyhow::Result<Url> {
	let mut url = parse_url(api)?;
	url.path_segments_mut()
		.map_err(|_| anyhow!("stream api url cannot take a path: {api}"))?
		.pop_if_empty()
		.push(tvid);
	url.query_pairs_mut().append_pair("random", &format!("{random:.14}"));
	Ok(url)
}

/// Parse the JSONP discovery response.
pub fn parse_chat_server(body: &[u8]) -> anyhow::Result<ChatServerInfo> {
	let v: Value = decode_jsonp(body).context("parse sina chat server discovery response")?;

	let field = |name: &str| v.get(name).and_then(Value::as_str).map(str::to_owned);
	let server = field("server").ok_or_else(|| anyhow!("sina did not return a valid chat server"))?;
	let channel = field("channel").ok_or_else(|| anyhow!("sina did not return a valid chat channel"))?;
	let token = field("ukey").ok_or_else(|| anyhow!("sina did not return a valid authentication token"))?;

	Ok(ChatServerInfo {
		server,
		channel,
		token: SecretString::new(token),
	})
}

/// Parse the broadcast info JSON into stream URLs.
pub fn parse_stream_urls(body: &[u8]) -> anyhow::Result<Vec<String>> {
	let v: Value = serde_json::from_slice(body).context("parse sina broadcast info")?;

	if v.get("result").and_then(Value::as_str) != Some("succ") {
		return Err(anyhow!("sina reported error when fetching broadcast information"));
	}

	let raw = v
		.get("stream_url")
		.and_then(Value::as_str)
		.ok_or_else(|| anyhow!("sina did not return a valid stream URL"))?;

	Ok(raw
		.split(',')
		.map(|entry| entry.split('|').next().unwrap_or_default().to_string())
		.filter(|url| !url.trim().is_empty())
		.collect())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn chatroom_id_from_page() {
		let html = br#"<script>var $CONFIG = {uid:'1', chatRoomId:'889900', title:'x'};</script>"#;
		assert_eq!(extract_chatroom_id(html).as_deref(), Some("889900"));
		assert_eq!(extract_chatroom_id(b"<html>chatRoomId:''</html>"), None);
	}

	#[test]
	fn tvid_from_page() {
		let html = b"<embed src=\"player.swf?tvid=31337&auto=1\">";
		assert_eq!(extract_tvid(html).as_deref(), Some("31337"));
		assert_eq!(extract_tvid(b"no id"), None);
	}

	#[test]
	fn discovery_url_shape() {
		let url = chat_server_discovery_url(DEFAULT_DISCOVERY_URL, "889900", "AbC123xYz0", 1_434_000_000).expect("url");
		assert_eq!(
			url.as_str(),
			"http://nas.uc.sina.com.cn/webroom/?type=finance&callback=jsonp1434000000&roomid=889900&ukey=AbC123xYz0&_=1434000001"
		);
	}

	#[test]
	fn discovery_url_keeps_credentials_and_empty_port() {
		let url = chat_server_discovery_url("http://user:pw@nas.example.com:/webroom/?v=2", "1", "k", 10).expect("url");
		assert_eq!(url.username(), "user");
		assert_eq!(
			url.as_str(),
			"http://user:pw@nas.example.com/webroom/?v=2&type=finance&callback=jsonp10&roomid=1&ukey=k&_=11"
		);
		assert!(chat_server_discovery_url("not a url", "1", "k", 10).is_err());
	}

	#[test]
	fn stream_info_url_shape() {
		let url = stream_info_url(DEFAULT_STREAM_API_URL, "31337", 0.5).expect("url");
		assert_eq!(
			url.as_str(),
			"http://kan.sina.com.cn/api/kan_2013_getinfo/tvid/31337?random=0.50000000000000"
		);
	}

	#[test]
	fn chat_server_from_jsonp() {
		let body = br#"jsonp1434000000({"server":"http://im.example.com/cometd","channel":"/chatroom/889900","ukey":"tok"})"#;
		let info = parse_chat_server(body).expect("parse");
		assert_eq!(info.server, "http://im.example.com/cometd");
		assert_eq!(info.channel, "/chatroom/889900");
		assert_eq!(info.token.expose(), "tok");
	}

	#[test]
	fn chat_server_missing_fields() {
		let err = parse_chat_server(br#"cb({"channel":"/c","ukey":"t"})"#).unwrap_err();
		assert!(err.to_string().contains("chat server"), "{err}");

		let err = parse_chat_server(br#"cb({"server":"http://s","ukey":"t"})"#).unwrap_err();
		assert!(err.to_string().contains("chat channel"), "{err}");

		let err = parse_chat_server(br#"cb({"server":"http://s","channel":"/c","ukey":5})"#).unwrap_err();
		assert!(err.to_string().contains("authentication token"), "{err}");

		assert!(parse_chat_server(b"<html>502</html>").is_err());
	}

	#[test]
	fn stream_urls_split_and_strip_labels() {
		let body = br#"{"result":"succ","stream_url":"http://a/1.flv|hd,http://b/2.flv|sd,http://c/3.flv"}"#;
		assert_eq!(
			parse_stream_urls(body).expect("parse"),
			vec!["http://a/1.flv", "http://b/2.flv", "http://c/3.flv"]
		);
	}

	#[test]
	fn stream_urls_errors() {
		assert!(parse_stream_urls(br#"{"result":"fail"}"#).is_err());
		assert!(parse_stream_urls(br#"{"result":"succ"}"#).is_err());
		assert!(parse_stream_urls(b"not json").is_err());
	}
}
