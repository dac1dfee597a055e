//! Two-stage payload decoding for incoming messages
//!
//! Raw transport payloads are decoded once per message: bytes are read
//! as UTF-8 text, then an optional structured JSON parse is attempted.
//! The result is a tagged value rather than an error, so a malformed
//! body degrades to plain text instead of failing dispatch.

use serde_json::Value;

/// Decoded form of a raw message payload.
///
/// Every incoming payload decodes to exactly one of these variants.
/// There is no error case: listeners always receive something.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedPayload {
	/// Payload parsed as a JSON document.
	Structured(Value),
	/// Payload delivered as raw text (not valid JSON).
	Raw(String),
}

impl DecodedPayload {
	/// Decode raw payload bytes.
	///
	/// Bytes are interpreted as UTF-8 (lossily, so this is total) and
	/// then parsed as JSON. Parse failure is not an error; the decoded
	/// text is delivered as [`DecodedPayload::Raw`] instead.
	pub fn decode(bytes: &[u8]) -> Self {
		let text = String::from_utf8_lossy(bytes);
		match serde_json::from_str::<Value>(&text) {
			| Ok(value) => Self::Structured(value),
			| Err(_) => Self::Raw(text.into_owned()),
		}
	}

	/// Returns the JSON document if the payload parsed as one.
	pub fn as_structured(&self) -> Option<&Value> {
		match self {
			| Self::Structured(value) => Some(value),
			| Self::Raw(_) => None,
		}
	}

	/// Returns the raw text if the payload did not parse as JSON.
	pub fn as_raw(&self) -> Option<&str> {
		match self {
			| Self::Structured(_) => None,
			| Self::Raw(text) => Some(text),
		}
	}
}
