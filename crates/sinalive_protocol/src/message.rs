#![forbid(unsafe_code)]

use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::channel;
use crate::version::{BAYEUX_MINIMUM_VERSION, BAYEUX_VERSION};

/// The only connection type this client speaks.
pub const CONNECTION_TYPE: &str = "callback-polling";

/// Server-assigned session id from a successful handshake.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
	/// Create a non-empty `ClientId`.
	pub fn new(id: impl Into<String>) -> Option<Self> {
		let id = id.into();
		if id.trim().is_empty() { None } else { Some(Self(id)) }
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for ClientId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// One outgoing Bayeux message. `id` is left empty and filled in by the transport at send time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BayeuxMessage {
	pub channel: String,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub id: Option<u64>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub client_id: Option<ClientId>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub version: Option<String>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub minimum_version: Option<String>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub supported_connection_types: Option<Vec<String>>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub connection_type: Option<String>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub subscription: Option<String>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}

impl BayeuxMessage {
	fn on_channel(channel: &str) -> Self {
		Self {
			channel: channel.to_string(),
			id: None,
			client_id: None,
			version: None,
			minimum_version: None,
			supported_connection_types: None,
			connection_type: None,
			subscription: None,
			data: None,
		}
	}

	/// `/meta/handshake` advertising callback-polling only.
	pub fn handshake() -> Self {
		Self {
			version: Some(BAYEUX_VERSION.to_string()),
			minimum_version: Some(BAYEUX_MINIMUM_VERSION.to_string()),
			supported_connection_types: Some(vec![CONNECTION_TYPE.to_string()]),
			..Self::on_channel(channel::HANDSHAKE)
		}
	}

	/// `/meta/connect`; used both to establish the session and as the long-poll request.
	pub fn connect(client_id: &ClientId) -> Self {
		Self {
			client_id: Some(client_id.clone()),
			connection_type: Some(CONNECTION_TYPE.to_string()),
			..Self::on_channel(channel::CONNECT)
		}
	}

	/// `/im/req` `authuser` with the discovery token and the client key.
	pub fn auth_user(client_id: &ClientId, token: &str, user_key: &str) -> Self {
		Self::im_request(
			client_id,
			json!({
				"cmd": "authuser",
				"ukey": token,
				"ucode": user_key,
			}),
		)
	}

	/// `/meta/subscribe` to the chat room channel.
	pub fn subscribe(client_id: &ClientId, subscription: &str) -> Self {
		Self {
			client_id: Some(client_id.clone()),
			subscription: Some(subscription.to_string()),
			..Self::on_channel(channel::SUBSCRIBE)
		}
	}

	/// Arbitrary `/im/req` command.
	pub fn im_request(client_id: &ClientId, data: Value) -> Self {
		Self {
			client_id: Some(client_id.clone()),
			data: Some(data),
			..Self::on_channel(channel::IM_REQUEST)
		}
	}
}

/// Room id derived from a chat channel name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomIdGuess {
	pub rid: String,
	/// False when the channel had no digits and the whole name is used instead.
	pub from_digits: bool,
}

/// First run of ASCII digits in `channel`, or the whole channel when there is none.
pub fn guess_room_id(channel: &str) -> RoomIdGuess {
	let digits: String = channel
		.chars()
		.skip_while(|c| !c.is_ascii_digit())
		.take_while(|c| c.is_ascii_digit())
		.collect();

	if digits.is_empty() {
		RoomIdGuess {
			rid: channel.to_string(),
			from_digits: false,
		}
	} else {
		RoomIdGuess {
			rid: digits,
			from_digits: true,
		}
	}
}

/// `roomlist`, `vcard` and `roster` requests, sent together as one batch.
pub fn query_batch(client_id: &ClientId, rid: &str) -> Vec<BayeuxMessage> {
	vec![
		BayeuxMessage::im_request(client_id, json!({"cmd": "roomlist", "rid": rid, "cid": ""})),
		BayeuxMessage::im_request(client_id, json!({"cmd": "vcard"})),
		BayeuxMessage::im_request(client_id, json!({"cmd": "roster", "type": "all"})),
	]
}
