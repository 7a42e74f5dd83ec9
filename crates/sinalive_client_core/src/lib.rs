#![forbid(unsafe_code)]

use std::fmt;

use sinalive_protocol::{EnvelopeError, ResponseError};

pub mod config;
pub mod extract;
pub mod session;
pub mod transport;

pub use config::{ClientConfig, default_config_path, load_client_config, load_client_config_from_path};
pub use extract::{GIFT_MARKER_PREFIX, GIFT_PLACEHOLDER, emit_lines, render_chat_message};
pub use session::{PollOutcome, QueryFailurePolicy, Session, SessionParams, establish_session};
pub use transport::{HttpTransport, Transport};

/// Lifecycle step a protocol failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStep {
	Handshake,
	Connect,
	Authenticate,
	Subscribe,
	Query,
	Poll,
}

impl fmt::Display for LifecycleStep {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			Self::Handshake => "handshake",
			Self::Connect => "connect",
			Self::Authenticate => "authenticate",
			Self::Subscribe => "subscribe",
			Self::Query => "query",
			Self::Poll => "poll",
		};
		f.write_str(s)
	}
}

/// Errors for client core operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientCoreError {
	/// Connection, HTTP status or body read failure.
	#[error("transport error: {0}")]
	Transport(String),

	/// Request encoding or response envelope failure.
	#[error(transparent)]
	Envelope(#[from] EnvelopeError),

	/// The server answered, but not with a successful acknowledgement.
	#[error("{step} failed: {source}")]
	Protocol {
		step: LifecycleStep,
		#[source]
		source: ResponseError,
	},

	/// Writing chat lines failed.
	#[error("io error: {0}")]
	Io(String),

	/// Invalid configuration.
	#[error("config error: {0}")]
	Config(String),
}

impl ClientCoreError {
	pub fn protocol(step: LifecycleStep, source: ResponseError) -> Self {
		Self::Protocol { step, source }
	}
}

impl From<std::io::Error> for ClientCoreError {
	fn from(e: std::io::Error) -> Self {
		ClientCoreError::Io(e.to_string())
	}
}
