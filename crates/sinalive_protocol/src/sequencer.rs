#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicU64, Ordering};

/// Request and callback id counters for one transport.
///
/// The two counters are independent. Allocation is atomic, so ids never repeat even if
/// sends are pipelined; gaps are fine, reuse is not.
#[derive(Debug)]
pub struct IdSequencer {
	next_request: AtomicU64,
	next_callback: AtomicU64,
}

impl IdSequencer {
	pub const FIRST_REQUEST_ID: u64 = 1;
	pub const FIRST_CALLBACK_ID: u64 = 0;

	pub fn new() -> Self {
		Self {
			next_request: AtomicU64::new(Self::FIRST_REQUEST_ID),
			next_callback: AtomicU64::new(Self::FIRST_CALLBACK_ID),
		}
	}

	/// Allocate the `id` for one outgoing message.
	pub fn next_request_id(&self) -> u64 {
		self.next_request.fetch_add(1, Ordering::Relaxed)
	}

	/// Allocate the JSONP callback suffix for one outgoing batch.
	pub fn next_callback_id(&self) -> u64 {
		self.next_callback.fetch_add(1, Ordering::Relaxed)
	}
}

impl Default for IdSequencer {
	fn default() -> Self {
		Self::new()
	}
}
