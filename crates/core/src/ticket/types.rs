//! Core ticket data types.
//!
//! Field names follow the verification API's camelCase JSON. Timestamps are
//! kept as the backend sent them; [`parse_timestamp`] interprets them for
//! display.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a ticket as reported by the backend.
///
/// `Used` and `Refunded` are absorbing: nothing leads back to `Purchased`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Purchased,
    Used,
    Refunded,
}

impl TicketStatus {
    /// Returns true if the ticket can still be redeemed.
    pub fn is_redeemable(&self) -> bool {
        matches!(self, TicketStatus::Purchased)
    }

    /// Returns true if no transition leads out of this status.
    pub fn is_absorbing(&self) -> bool {
        !self.is_redeemable()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Purchased => "purchased",
            TicketStatus::Used => "used",
            TicketStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Venue of a concert session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Venue {
    pub venue_name: String,
    pub venue_address: String,
}

/// Event metadata attached to a ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConcertInfo {
    /// Concert title.
    #[serde(rename = "conTitle")]
    pub title: String,
    pub session_title: String,
    pub session_date: String,
    pub venue: Venue,
}

/// Redemption metadata, present once a ticket has been used.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Verification {
    pub verified_at: String,
    pub verified_by: Option<String>,
    pub location: Option<String>,
    pub note: Option<String>,
}

/// A ticket as returned by the lookup endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    /// Opaque backend identifier.
    pub ticket_id: String,

    pub status: TicketStatus,

    pub concert_info: ConcertInfo,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<String>,

    /// Operator who redeemed the ticket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Ticket {
    /// Redemption metadata, if the ticket is used and the backend reported
    /// when.
    pub fn verification(&self) -> Option<Verification> {
        if self.status != TicketStatus::Used {
            return None;
        }
        self.verified_at.as_ref().map(|verified_at| Verification {
            verified_at: verified_at.clone(),
            verified_by: self.verified_by.clone(),
            location: self.verification_location.clone(),
            note: self.note.clone(),
        })
    }
}

/// Body of a redemption request.
///
/// Location and note are opaque context passed through to the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RedeemRequest {
    /// Ticket that was looked up.
    pub ticket_id: String,
    /// Raw QR payload the ticket was looked up with.
    pub qr_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Details of a successful redemption.
///
/// Every field is optional; a redemption the backend accepted stands even
/// when the details are partial.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RedeemedTicket {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concert_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<String>,
}

/// Response of the redemption endpoint.
///
/// `success == false` is a business rejection (e.g. already used), not a
/// fault.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RedeemOutcome {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<RedeemedTicket>,
}

impl RedeemOutcome {
    pub fn accepted(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: RedeemedTicket) -> Self {
        self.data = Some(data);
        self
    }
}

/// Aggregate redemption statistics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationStats {
    pub total_tickets: u64,
    pub used_tickets: u64,
    pub purchased_tickets: u64,
    pub refunded_tickets: u64,
    /// Preformatted by the backend, e.g. "42.50%".
    pub verification_rate: String,
}

impl VerificationStats {
    /// Verification rate as a number, if the backend string parses.
    pub fn verification_rate_percent(&self) -> Option<f64> {
        self.verification_rate
            .trim()
            .trim_end_matches('%')
            .trim()
            .parse()
            .ok()
    }
}

/// Interpret a backend timestamp.
///
/// Accepts RFC 3339 and naive `YYYY-MM-DD[T ]HH:MM[:SS[.f]]` forms; naive
/// values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];

    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}
