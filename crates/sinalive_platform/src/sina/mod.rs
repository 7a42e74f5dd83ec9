#![forbid(unsafe_code)]

mod client;

pub use client::{
	ChatServerInfo, DEFAULT_DISCOVERY_URL, DEFAULT_STREAM_API_URL, SinaClient, SinaEndpoints, chat_server_discovery_url,
	extract_chatroom_id, extract_tvid, parse_chat_server, parse_stream_urls, stream_info_url,
};
use sinalive_util::live_page::is_known_live_page_url;
use tracing::warn;

/// Warn (but carry on) when the page URL is not a recognised live room page.
pub fn check_live_page_url(url: &str) {
	if !is_known_live_page_url(url) {
		warn!(url = %url, "url does not look like a Sina Live room page");
	}
}
