#![forbid(unsafe_code)]

use std::io::Write;

/// Raw messages starting with this are gift notifications.
pub const GIFT_MARKER_PREFIX: &str = r#"{"pid":"#;

/// Printed instead of a gift notification's JSON.
pub const GIFT_PLACEHOLDER: &str = "{观众发送了一份礼物}";

/// Printable form of one raw chat message.
pub fn render_chat_message(raw: &str) -> String {
	if raw.starts_with(GIFT_MARKER_PREFIX) {
		GIFT_PLACEHOLDER.to_string()
	} else {
		raw.to_string()
	}
}

/// Write one line per message, then flush once for the whole batch.
pub fn emit_lines<W, I, S>(out: &mut W, lines: I) -> std::io::Result<usize>
where
	W: Write,
	I: IntoIterator<Item = S>,
	S: AsRef<str>,
{
	let mut written = 0;
	for line in lines {
		out.write_all(render_chat_message(line.as_ref()).as_bytes())?;
		out.write_all(b"\n")?;
		written += 1;
	}
	out.flush()?;
	Ok(written)
}
