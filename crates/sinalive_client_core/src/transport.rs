#![forbid(unsafe_code)]

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sinalive_protocol::{BayeuxMessage, EnvelopeError, IdSequencer, decode_envelope, encode_request_url};
use tracing::debug;
use url::Url;

use crate::ClientCoreError;

/// One JSONP round trip: a batch of messages out, the decoded response array back.
#[async_trait]
pub trait Transport: Send + Sync {
	async fn send(&self, batch: Vec<BayeuxMessage>) -> Result<Vec<Value>, ClientCoreError>;
}

/// Bayeux-over-JSONP transport on plain HTTP GETs.
///
/// Owns the id sequencer, so every message sent through one transport gets a fresh id.
/// No request timeout is set: `/meta/connect` polls are held open by the server.
#[derive(Debug)]
pub struct HttpTransport {
	base: Url,
	client: reqwest::Client,
	ids: IdSequencer,
}

impl HttpTransport {
	pub fn new(base_url: &str, user_agent: &str, connect_timeout: Option<Duration>) -> Result<Self, ClientCoreError> {
		let base = Url::parse(base_url.trim())
			.map_err(|e| ClientCoreError::Config(format!("invalid chat server url {base_url}: {e}")))?;
		if !matches!(base.scheme(), "http" | "https") {
			return Err(ClientCoreError::Config(format!(
				"invalid chat server url {base_url}: expected http:// or https://"
			)));
		}

		let mut builder = reqwest::Client::builder().user_agent(user_agent);
		if let Some(timeout) = connect_timeout {
			builder = builder.connect_timeout(timeout);
		}
		let client = builder
			.build()
			.map_err(|e| ClientCoreError::Transport(format!("build http client: {e}")))?;

		Ok(Self {
			base,
			client,
			ids: IdSequencer::new(),
		})
	}
}

#[async_trait]
impl Transport for HttpTransport {
	async fn send(&self, mut batch: Vec<BayeuxMessage>) -> Result<Vec<Value>, ClientCoreError> {
		if batch.is_empty() {
			return Err(EnvelopeError::EmptyBatch.into());
		}

		for msg in &mut batch {
			msg.id = Some(self.ids.next_request_id());
		}
		let callback_id = self.ids.next_callback_id();
		let url = encode_request_url(&self.base, &batch, callback_id)?;

		debug!(
			channel = %batch[0].channel,
			messages = batch.len(),
			callback_id,
			"bayeux request"
		);
		metrics::counter!("sinalive_bayeux_requests_total").increment(1);

		let resp = self
			.client
			.get(url)
			.send()
			.await
			.map_err(|e| ClientCoreError::Transport(format!("GET {}: {e}", self.base)))?;

		let status = resp.status();
		if !status.is_success() {
			return Err(ClientCoreError::Transport(format!("GET {}: status={status}", self.base)));
		}

		let body = resp
			.bytes()
			.await
			.map_err(|e| ClientCoreError::Transport(format!("read body from {}: {e}", self.base)))?;

		Ok(decode_envelope(&body)?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_invalid_base_url() {
		for raw in ["ftp://chat.example.com/", "chat.example.com/cometd", "http://", ""] {
			let err = HttpTransport::new(raw, "ua", None).unwrap_err();
			assert!(matches!(err, ClientCoreError::Config(_)), "{raw}: {err:?}");
		}
	}

	#[test]
	fn accepts_any_valid_http_base_url() {
		for raw in [
			"http://user:pw@chat.example.com/cometd",
			"http://chat.example.com:/cometd",
			"https://[::1]:8443/bayeux?room=1",
			" http://chat.example.com/cometd ",
		] {
			let transport = HttpTransport::new(raw, "ua", None).expect(raw);
			assert!(transport.base.path().ends_with("/cometd") || transport.base.path() == "/bayeux");
		}
	}

	#[tokio::test]
	async fn empty_batch_is_rejected_before_any_request() {
		let transport = HttpTransport::new("http://127.0.0.1:9/cometd", "ua", None).expect("transport");
		let err = transport.send(Vec::new()).await.unwrap_err();
		assert!(
			matches!(err, ClientCoreError::Envelope(EnvelopeError::EmptyBatch)),
			"{err:?}"
		);
		assert_eq!(transport.ids.next_request_id(), IdSequencer::FIRST_REQUEST_ID);
		assert_eq!(transport.ids.next_callback_id(), IdSequencer::FIRST_CALLBACK_ID);
	}
}
