#![forbid(unsafe_code)]

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;
use sinalive_platform::SecretString;
use sinalive_protocol::{
	BayeuxMessage, ClientId, PollData, ResponseError, first_ack, guess_room_id, handshake_client_id, poll_data,
	query_batch,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::extract::emit_lines;
use crate::transport::Transport;
use crate::{ClientCoreError, LifecycleStep};

/// Inputs for establishing a chat session, usually from chat-server discovery.
#[derive(Debug, Clone)]
pub struct SessionParams {
	/// Room channel to subscribe to.
	pub channel: String,
	/// One-time token from discovery, sent as `ukey`.
	pub auth_token: SecretString,
	/// Client key, sent as `ucode`.
	pub user_key: String,
}

/// What to do when the room query batch is rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryFailurePolicy {
	#[default]
	Fatal,
	Warn,
}

impl FromStr for QueryFailurePolicy {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"fatal" => Ok(Self::Fatal),
			"warn" => Ok(Self::Warn),
			other => Err(format!("invalid query failure policy {other:?} (expected fatal or warn)")),
		}
	}
}

impl fmt::Display for QueryFailurePolicy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Fatal => "fatal",
			Self::Warn => "warn",
		})
	}
}

/// Result of one long poll that was acknowledged by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollOutcome {
	/// Raw chat lines, in server order.
	pub messages: Vec<String>,
	/// Malformed data event riding along with a good acknowledgement.
	pub anomaly: Option<ResponseError>,
}

/// An established Bayeux session, ready to poll.
#[derive(Debug)]
pub struct Session<T> {
	transport: T,
	client_id: ClientId,
	session_id: Uuid,
}

async fn round_trip<T: Transport>(
	transport: &T,
	step: LifecycleStep,
	batch: Vec<BayeuxMessage>,
) -> Result<Vec<Value>, ClientCoreError> {
	debug!(%step, "sending");
	transport.send(batch).await
}

async fn acknowledged<T: Transport>(
	transport: &T,
	step: LifecycleStep,
	batch: Vec<BayeuxMessage>,
) -> Result<(), ClientCoreError> {
	let resp = round_trip(transport, step, batch).await?;
	first_ack(&resp).map_err(|e| ClientCoreError::protocol(step, e))?;
	Ok(())
}

/// Run handshake, connect, authenticate, subscribe and query, in that order.
///
/// Each step waits for its acknowledgement before the next is sent. Any failure
/// ends the lifecycle, except a query failure under [`QueryFailurePolicy::Warn`].
pub async fn establish_session<T: Transport>(
	transport: T,
	params: &SessionParams,
	query_policy: QueryFailurePolicy,
) -> Result<Session<T>, ClientCoreError> {
	let session_id = Uuid::new_v4();

	let resp = round_trip(&transport, LifecycleStep::Handshake, vec![BayeuxMessage::handshake()]).await?;
	let client_id = handshake_client_id(&resp).map_err(|e| ClientCoreError::protocol(LifecycleStep::Handshake, e))?;
	info!(%session_id, client_id = %client_id, "handshake complete");

	acknowledged(&transport, LifecycleStep::Connect, vec![BayeuxMessage::connect(&client_id)]).await?;

	acknowledged(
		&transport,
		LifecycleStep::Authenticate,
		vec![BayeuxMessage::auth_user(
			&client_id,
			params.auth_token.expose(),
			&params.user_key,
		)],
	)
	.await?;

	acknowledged(
		&transport,
		LifecycleStep::Subscribe,
		vec![BayeuxMessage::subscribe(&client_id, &params.channel)],
	)
	.await?;
	info!(%session_id, channel = %params.channel, "subscribed");

	let room = guess_room_id(&params.channel);
	if !room.from_digits {
		warn!(channel = %params.channel, "no room id digits in channel name; using the whole channel");
	}
	match acknowledged(&transport, LifecycleStep::Query, query_batch(&client_id, &room.rid)).await {
		Ok(()) => {}
		Err(err) if query_policy == QueryFailurePolicy::Warn => {
			warn!(%session_id, error = %err, "room query failed; continuing to poll");
		}
		Err(err) => return Err(err),
	}

	Ok(Session {
		transport,
		client_id,
		session_id,
	})
}

impl<T: Transport> Session<T> {
	pub fn client_id(&self) -> &ClientId {
		&self.client_id
	}

	/// Issue one `/meta/connect` long poll and wait for its answer.
	///
	/// A missing or unsuccessful acknowledgement is an error; a malformed data event
	/// is reported in [`PollOutcome::anomaly`].
	pub async fn poll_once(&self) -> Result<PollOutcome, ClientCoreError> {
		let resp = round_trip(
			&self.transport,
			LifecycleStep::Poll,
			vec![BayeuxMessage::connect(&self.client_id)],
		)
		.await?;
		first_ack(&resp).map_err(|e| ClientCoreError::protocol(LifecycleStep::Poll, e))?;

		let outcome = match poll_data(&resp) {
			Ok(PollData::Messages(messages)) => PollOutcome {
				messages,
				anomaly: None,
			},
			Ok(PollData::Ignored { kind }) => {
				debug!(%kind, "ignoring data event");
				PollOutcome::default()
			}
			Ok(PollData::Absent) => PollOutcome::default(),
			Err(anomaly) => PollOutcome {
				messages: Vec::new(),
				anomaly: Some(anomaly),
			},
		};
		Ok(outcome)
	}

	/// Poll until `cancel` fires or a poll fails, writing chat lines to `out`.
	///
	/// The token is checked before each poll; a poll already in flight runs to completion.
	pub async fn run_poll_loop<W: Write>(&self, cancel: &CancellationToken, out: &mut W) -> Result<(), ClientCoreError> {
		info!(session_id = %self.session_id, "entering poll loop");
		loop {
			if cancel.is_cancelled() {
				info!(session_id = %self.session_id, "poll loop cancelled");
				return Ok(());
			}

			let outcome = self.poll_once().await?;

			if let Some(anomaly) = outcome.anomaly {
				metrics::counter!("sinalive_poll_anomalies_total").increment(1);
				warn!(session_id = %self.session_id, error = %anomaly, "malformed poll data; continuing");
			}

			if !outcome.messages.is_empty() {
				let written = emit_lines(out, &outcome.messages)?;
				metrics::counter!("sinalive_chat_messages_total").increment(written as u64);
			}
		}
	}
}
