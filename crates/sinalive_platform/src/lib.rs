#![forbid(unsafe_code)]

pub mod sina;

use std::fmt;

use rand::Rng as _;

/// Browser user-agent sent with every request to the Sina endpoints and the chat server.
pub const USER_AGENT: &str =
	"Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/43.0.2357.81 Safari/537.36";

const USER_KEY_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const USER_KEY_LEN: usize = 10;

/// Wrapper that redacts in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
	pub fn new(s: impl Into<String>) -> Self {
		Self(s.into())
	}

	/// Access the inner secret string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}

impl fmt::Debug for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("SecretString(<redacted>)")
	}
}

impl fmt::Display for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("<redacted>")
	}
}

/// Random anonymous client key (`ucode`), 10 alphanumeric characters.
pub fn generate_user_key() -> String {
	let mut rng = rand::rng();
	(0..USER_KEY_LEN)
		.map(|_| USER_KEY_ALPHABET[rng.random_range(0..USER_KEY_ALPHABET.len())] as char)
		.collect()
}
