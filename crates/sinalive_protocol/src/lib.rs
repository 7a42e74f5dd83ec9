#![forbid(unsafe_code)]

pub mod envelope;
pub mod message;
pub mod response;
pub mod sequencer;

pub use envelope::{CALLBACK_PREFIX, EnvelopeError, decode_envelope, decode_jsonp, encode_request_url, peel_jsonp};
pub use message::{BayeuxMessage, CONNECTION_TYPE, ClientId, RoomIdGuess, guess_room_id, query_batch};
pub use response::{AckResponse, PollData, ResponseError, first_ack, handshake_client_id, poll_data};
pub use sequencer::IdSequencer;

/// Bayeux protocol constants.
pub mod version {
	/// Protocol version announced at handshake.
	pub const BAYEUX_VERSION: &str = "1.0";
	/// Oldest protocol version the client accepts.
	pub const BAYEUX_MINIMUM_VERSION: &str = "0.9";
}

/// Well-known Bayeux channels used by the chat server.
pub mod channel {
	pub const HANDSHAKE: &str = "/meta/handshake";
	pub const CONNECT: &str = "/meta/connect";
	pub const SUBSCRIBE: &str = "/meta/subscribe";
	/// Chat server's request/response side channel.
	pub const IM_REQUEST: &str = "/im/req";
}
