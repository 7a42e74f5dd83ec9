#![forbid(unsafe_code)]

use std::sync::OnceLock;

use regex::bytes::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// JSONP wrapper function name prefix; the callback id is appended to it.
pub const CALLBACK_PREFIX: &str = "parent.org.cometd.script._callback";

#[derive(Debug, Error)]
pub enum EnvelopeError {
	#[error("request batch must contain at least one message")]
	EmptyBatch,

	#[error("failed to serialize request batch: {0}")]
	Encode(#[source] serde_json::Error),

	#[error("malformed envelope: no JSONP wrapper found")]
	MissingWrapper,

	#[error("malformed envelope: {0}")]
	InvalidJson(#[source] serde_json::Error),
}

fn jsonp_peeler() -> &'static Regex {
	static PEELER: OnceLock<Regex> = OnceLock::new();
	// Leftmost `(` up to the last `)`; `.` matches any byte, newlines included.
	PEELER.get_or_init(|| Regex::new(r"(?s-u)\((.*)\)").expect("static JSONP regex"))
}

/// Build `<base>?message=<json>&jsonp=<prefix><callback_id>` for a request batch.
///
/// Any query already on `base` is kept; the two parameters are appended after it.
pub fn encode_request_url<M: Serialize>(base: &Url, messages: &[M], callback_id: u64) -> Result<Url, EnvelopeError> {
	if messages.is_empty() {
		return Err(EnvelopeError::EmptyBatch);
	}

	let json = serde_json::to_string(messages).map_err(EnvelopeError::Encode)?;
	let mut url = base.clone();
	url.query_pairs_mut()
		.append_pair("message", &json)
		.append_pair("jsonp", &format!("{CALLBACK_PREFIX}{callback_id}"));
	Ok(url)
}

/// Return the bytes between the JSONP wrapper's parentheses.
pub fn peel_jsonp(body: &[u8]) -> Result<&[u8], EnvelopeError> {
	jsonp_peeler()
		.captures(body)
		.and_then(|caps| caps.get(1))
		.map(|m| m.as_bytes())
		.ok_or(EnvelopeError::MissingWrapper)
}

/// Peel a JSONP body and deserialize its interior.
pub fn decode_jsonp<T: DeserializeOwned>(body: &[u8]) -> Result<T, EnvelopeError> {
	let inner = peel_jsonp(body)?;
	serde_json::from_slice(inner).map_err(EnvelopeError::InvalidJson)
}

/// Peel a Bayeux response body into its ordered response array.
pub fn decode_envelope(body: &[u8]) -> Result<Vec<Value>, EnvelopeError> {
	decode_jsonp(body)
}
