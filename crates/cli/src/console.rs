//! Line-oriented operator console.
//!
//! Stdin doubles as a keyboard-wedge scanner: plain lines are scanned codes,
//! lines starting with `/` are operator commands.

use std::io::BufRead;
use std::sync::Arc;

use tracing::{debug, warn};

use tickeasy_core::redemption::{OperatorAction, WorkflowEvent, WorkflowHandle};
use tickeasy_core::ticket::parse_timestamp;
use tickeasy_core::{
    BackendError, GatedScanner, ScanEvent, SessionSnapshot, StatsReport, TicketStatus,
    WorkflowState,
};

/// One line of operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Scan(String),
    Confirm,
    NewScan,
    Quit,
    Help,
    Unknown(String),
    Empty,
}

pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }

    match line {
        "/confirm" | "/c" => Input::Confirm,
        "/new" | "/n" => Input::NewScan,
        "/quit" | "/q" => Input::Quit,
        "/help" | "/h" => Input::Help,
        command if command.starts_with('/') => Input::Unknown(command.to_string()),
        code => Input::Scan(code.to_string()),
    }
}

pub fn print_help() {
    println!("Scan a ticket, or type a command:");
    println!("  /confirm  redeem the displayed ticket");
    println!("  /new      discard the current ticket and scan again");
    println!("  /quit     close the check-in session");
}

/// Read stdin on a dedicated thread until `/quit` or end of input.
pub fn spawn_stdin_reader(scanner: Arc<GatedScanner>, handle: WorkflowHandle) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    break;
                }
            };

            let delivered = match parse_input(&line) {
                Input::Scan(code) => match deliver_scan(&scanner, &handle, code) {
                    ScanDelivery::Delivered => true,
                    ScanDelivery::Paused => {
                        println!("Scanner is paused; type /new to scan another ticket");
                        true
                    }
                    ScanDelivery::Closed => false,
                },
                Input::Confirm => {
                    handle.emit_blocking(WorkflowEvent::Operator(OperatorAction::ConfirmRedemption))
                }
                Input::NewScan => {
                    handle.emit_blocking(WorkflowEvent::Operator(OperatorAction::ScanNewTicket))
                }
                Input::Quit => break,
                Input::Help => {
                    print_help();
                    true
                }
                Input::Unknown(command) => {
                    println!("Unknown command {}; type /help", command);
                    true
                }
                Input::Empty => true,
            };

            if !delivered {
                break;
            }
        }

        debug!("Stdin closed, ending check-in session");
        handle.emit_blocking(WorkflowEvent::Shutdown);
    });
}

/// Fate of a scanned line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanDelivery {
    Delivered,
    /// Dropped because the session is not scanning.
    Paused,
    /// The controller is gone.
    Closed,
}

fn deliver_scan(scanner: &GatedScanner, handle: &WorkflowHandle, code: String) -> ScanDelivery {
    if scanner.feed_blocking(ScanEvent::Decoded(code)) {
        ScanDelivery::Delivered
    } else if handle.is_closed() {
        ScanDelivery::Closed
    } else {
        ScanDelivery::Paused
    }
}

pub fn print_snapshot(snapshot: &SessionSnapshot) {
    println!("{}", render_snapshot(snapshot));
}

/// Human-readable view of a session.
pub fn render_snapshot(snapshot: &SessionSnapshot) -> String {
    let mut lines = vec![format!("[{}] {}", snapshot.state, headline(snapshot))];

    if let Some(ticket) = &snapshot.ticket {
        let info = &ticket.concert_info;
        lines.push(format!(
            "  {} / {} on {}",
            info.title,
            info.session_title,
            display_timestamp(&info.session_date)
        ));
        lines.push(format!(
            "  {}, {}",
            info.venue.venue_name, info.venue.venue_address
        ));
        lines.push(format!("  ticket {} ({})", ticket.ticket_id, ticket.status));

        if let Some(verification) = ticket.verification() {
            let mut line = format!("  verified {}", display_timestamp(&verification.verified_at));
            if let Some(by) = &verification.verified_by {
                line.push_str(&format!(" by {}", by));
            }
            if let Some(location) = &verification.location {
                line.push_str(&format!(" at {}", location));
            }
            lines.push(line);
        }
    }

    if let Some(success) = &snapshot.success {
        lines.push(format!("  OK: {}", success));
    }
    if let Some(error) = &snapshot.error {
        lines.push(format!("  ERROR: {}", error));
    }

    lines.join("\n")
}

/// Backend timestamps that do not parse are shown as sent.
fn display_timestamp(raw: &str) -> String {
    match parse_timestamp(raw) {
        Some(at) => at.format("%Y-%m-%d %H:%M").to_string(),
        None => raw.to_string(),
    }
}

fn headline(snapshot: &SessionSnapshot) -> String {
    match snapshot.state {
        WorkflowState::Scanning => "Ready to scan".to_string(),
        WorkflowState::LookingUp => format!(
            "Looking up {}",
            snapshot.scanned_code.as_deref().unwrap_or("ticket")
        ),
        WorkflowState::ReadyToRedeem => "Type /confirm to redeem, /new to skip".to_string(),
        WorkflowState::Blocked => match snapshot.ticket.as_ref().map(|t| t.status) {
            Some(TicketStatus::Refunded) => "Ticket was refunded; type /new".to_string(),
            _ => "Ticket already used; type /new".to_string(),
        },
        WorkflowState::Redeeming => "Redeeming...".to_string(),
        WorkflowState::Redeemed => "Redeemed; scanner resumes shortly".to_string(),
        WorkflowState::Error if snapshot.pending_resume.is_some() => {
            "Failed; scanner resumes shortly".to_string()
        }
        WorkflowState::Error => "Failed; type /confirm to retry or /new to scan again".to_string(),
    }
}

pub fn print_stats(report: &StatsReport, json: bool) {
    if json {
        match serde_json::to_string(report) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to serialize stats report: {}", e),
        }
    } else {
        println!("{}", render_stats(report));
    }
}

pub fn print_stats_error(error: &BackendError) {
    println!("Statistics unavailable: {}", error);
}

pub fn render_stats(report: &StatsReport) -> String {
    let stats = &report.stats;
    format!(
        "Statistics for {} at {}\n  total {}  used {}  purchased {}  refunded {}  rate {}",
        report.concert_id.as_deref().unwrap_or("all concerts"),
        report.fetched_at.format("%Y-%m-%d %H:%M:%S"),
        stats.total_tickets,
        stats.used_tickets,
        stats.purchased_tickets,
        stats.refunded_tickets,
        stats.verification_rate
    )
}
