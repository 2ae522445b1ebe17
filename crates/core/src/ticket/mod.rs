//! Tickets, QR payloads and the verification API's data types.

mod code;
mod types;

pub use code::{parse_code, ParsedCode, ScannedCode, CODE_DELIMITER, CODE_TAG};
pub use types::{
    parse_timestamp, ConcertInfo, RedeemOutcome, RedeemRequest, RedeemedTicket, Ticket, TicketStatus, Venue,
    Verification, VerificationStats,
};
