//! QR payload parsing.
//!
//! Ticket QR codes carry `TICKEASY|{userId}|{orderId}`. Anything else is
//! rejected locally and never sent to the backend.

use serde::{Deserialize, Serialize};

/// Tag every ticket QR payload starts with.
pub const CODE_TAG: &str = "TICKEASY";

/// Separator between payload segments.
pub const CODE_DELIMITER: char = '|';

/// Result of parsing a raw QR payload.
///
/// Invalid payloads carry no partial fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedCode {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

impl ParsedCode {
    fn invalid() -> Self {
        Self {
            valid: false,
            user_id: None,
            order_id: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn order_id(&self) -> Option<&str> {
        self.order_id.as_deref()
    }
}

/// Parse a raw decoded string. Never fails; malformed input yields an
/// invalid [`ParsedCode`].
pub fn parse_code(raw: &str) -> ParsedCode {
    let segments: Vec<&str> = raw.split(CODE_DELIMITER).collect();

    match segments.as_slice() {
        [tag, user_id, order_id] if *tag == CODE_TAG => ParsedCode {
            valid: true,
            user_id: Some((*user_id).to_string()),
            order_id: Some((*order_id).to_string()),
        },
        _ => ParsedCode::invalid(),
    }
}

/// A payload that passed validation, together with its raw text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedCode {
    pub raw: String,
    pub user_id: String,
    pub order_id: String,
}

impl ScannedCode {
    /// Validate a raw payload. Returns `None` for anything that is not a
    /// ticket code.
    pub fn parse(raw: &str) -> Option<Self> {
        let parsed = parse_code(raw);
        match (parsed.user_id, parsed.order_id) {
            (Some(user_id), Some(order_id)) if parsed.valid => Some(Self {
                raw: raw.to_string(),
                user_id,
                order_id,
            }),
            _ => None,
        }
    }
}
