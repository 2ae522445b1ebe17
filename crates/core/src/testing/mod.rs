//! Testing utilities and mock implementations.
//!
//! The mocks stand in for the ticket backend and the scan capability so the
//! redemption workflow can be driven end to end without a server or camera.
//!
//! # Example
//!
//! ```rust,ignore
//! use tickeasy_core::testing::{fixtures, MockScanner, MockTicketBackend};
//!
//! let backend = MockTicketBackend::new();
//! backend
//!     .add_ticket(&fixtures::code("u1", "o1"), fixtures::purchased_ticket("t-1"))
//!     .await;
//!
//! let scanner = MockScanner::new();
//! // Hand both to a RedemptionController...
//! ```

mod mock_backend;
mod mock_scanner;

pub use mock_backend::{MockTicketBackend, RecordedBackendCall};
pub use mock_scanner::MockScanner;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::ticket::{ConcertInfo, Ticket, TicketStatus, Venue, VerificationStats, CODE_TAG};

    /// A well-formed ticket code.
    pub fn code(user_id: &str, order_id: &str) -> String {
        format!("{}|{}|{}", CODE_TAG, user_id, order_id)
    }

    /// Create a test ticket with reasonable defaults.
    pub fn ticket(ticket_id: &str, status: TicketStatus) -> Ticket {
        let mut ticket = Ticket {
            ticket_id: ticket_id.to_string(),
            status,
            concert_info: ConcertInfo {
                title: "Spring Concert".to_string(),
                session_title: "Evening show".to_string(),
                session_date: "2025-04-12T19:30:00Z".to_string(),
                venue: Venue {
                    venue_name: "City Hall".to_string(),
                    venue_address: "1 Main Street".to_string(),
                },
            },
            verified_at: None,
            verified_by: None,
            verification_location: None,
            note: None,
        };

        if status == TicketStatus::Used {
            ticket.verified_at = Some("2025-04-12T19:05:00Z".to_string());
            ticket.verified_by = Some("gate-2".to_string());
            ticket.verification_location = Some("Side entrance".to_string());
        }

        ticket
    }

    pub fn purchased_ticket(ticket_id: &str) -> Ticket {
        ticket(ticket_id, TicketStatus::Purchased)
    }

    pub fn stats(total: u64, used: u64, purchased: u64, refunded: u64) -> VerificationStats {
        let rate = if total == 0 {
            0.0
        } else {
            used as f64 * 100.0 / total as f64
        };

        VerificationStats {
            total_tickets: total,
            used_tickets: used,
            purchased_tickets: purchased,
            refunded_tickets: refunded,
            verification_rate: format!("{:.2}%", rate),
        }
    }
}
