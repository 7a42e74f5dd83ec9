#![forbid(unsafe_code)]

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

use crate::message::ClientId;

/// Data event types that carry chat lines.
pub const MESSAGE_EVENT_TYPES: &[&str] = &["msg", "lastmsg"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseError {
	#[error("empty response envelope")]
	Empty,

	#[error("server reported failure: {}", .error.as_deref().unwrap_or("no detail"))]
	Unsuccessful {
		error: Option<String>,
	},

	#[error("unexpected response shape: {0}")]
	Shape(String),

	#[error("handshake response carried no clientId")]
	MissingClientId,
}

/// Generic acknowledgement: the first element of every response envelope.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckResponse {
	#[serde(default)]
	pub successful: Option<bool>,

	#[serde(default, deserialize_with = "lenient_string")]
	pub channel: Option<String>,

	#[serde(default, deserialize_with = "lenient_string")]
	pub client_id: Option<String>,

	#[serde(default, deserialize_with = "lenient_string")]
	pub error: Option<String>,
}

/// Informational ack fields: anything but a string reads as absent.
fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
	Ok(match Option::<Value>::deserialize(d)? {
		Some(Value::String(s)) => Some(s),
		_ => None,
	})
}

/// Validate the first response element and require `successful: true`.
pub fn first_ack(resp: &[Value]) -> Result<AckResponse, ResponseError> {
	let first = resp.first().ok_or(ResponseError::Empty)?;
	let ack = AckResponse::deserialize(first).map_err(|e| ResponseError::Shape(format!("acknowledgement: {e}")))?;
	if ack.successful != Some(true) {
		return Err(ResponseError::Unsuccessful { error: ack.error });
	}
	Ok(ack)
}

/// Client id from a successful handshake response.
pub fn handshake_client_id(resp: &[Value]) -> Result<ClientId, ResponseError> {
	let ack = first_ack(resp)?;
	ack.client_id.and_then(ClientId::new).ok_or(ResponseError::MissingClientId)
}

/// Content of a poll response's second element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollData {
	/// No second element, or it has no `data` object.
	Absent,

	/// A data event whose type carries no chat lines.
	Ignored {
		kind: String,
	},

	/// Raw chat lines in server order; entries without a `msg` string are dropped.
	Messages(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct PollEventData {
	#[serde(rename = "type")]
	kind: String,

	#[serde(default)]
	msgs: Option<Value>,
}

/// Inspect the optional second element of a poll response.
///
/// Errors here describe a malformed data event; the caller decides whether that is fatal.
pub fn poll_data(resp: &[Value]) -> Result<PollData, ResponseError> {
	let Some(event) = resp.get(1) else {
		return Ok(PollData::Absent);
	};
	let Some(data) = event.get("data").filter(|d| d.is_object()) else {
		return Ok(PollData::Absent);
	};

	let data = PollEventData::deserialize(data).map_err(|e| ResponseError::Shape(format!("poll event data: {e}")))?;
	if !MESSAGE_EVENT_TYPES.contains(&data.kind.as_str()) {
		return Ok(PollData::Ignored { kind: data.kind });
	}

	let items = match data.msgs {
		Some(Value::Array(items)) => items,
		Some(other) => {
			return Err(ResponseError::Shape(format!(
				"poll event msgs is not an array (type={}): {other}",
				data.kind
			)));
		}
		None => {
			return Err(ResponseError::Shape(format!("poll event of type {} has no msgs", data.kind)));
		}
	};

	let lines = items
		.iter()
		.filter_map(|item| item.get("msg").and_then(Value::as_str))
		.map(str::to_owned)
		.collect();
	Ok(PollData::Messages(lines))
}
