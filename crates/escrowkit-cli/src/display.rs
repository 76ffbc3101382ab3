//! Display utilities for the CLI

use colored::*;
use escrowkit_types::{EscrowEvent, Status};

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", "━".repeat(60).bright_black());
    println!(" {}", title.bright_white().bold());
    println!("{}", "━".repeat(60).bright_black());
}

/// Print a success message
pub fn success(message: &str) {
    println!("  {} {}", "✓".bright_green(), message);
}

/// Print an error message
pub fn error(message: &str) {
    println!("  {} {}", "✗".bright_red(), message.bright_red());
}

/// Print an info message
pub fn info(message: &str) {
    println!("  {} {}", "→".bright_blue(), message);
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("      {}: {}", key, value.bright_cyan());
}

pub fn status(status: Status) -> ColoredString {
    match status {
        Status::Ongoing => status.to_string().yellow(),
        Status::Fulfilled => status.to_string().bright_green(),
        Status::Cancelled => status.to_string().bright_red(),
    }
}

/// One-line summary of an event
pub fn event(sequence: u64, event: &EscrowEvent) {
    let detail = match event {
        EscrowEvent::NewTransaction {
            sender,
            receiver,
            broker,
            goal,
            terms,
            ..
        } => format!(
            "{sender} → {receiver}, goal {goal}, terms {terms}, broker {}",
            broker.as_ref().map(|b| b.as_str()).unwrap_or("none")
        ),
        EscrowEvent::FundsCommitted {
            from,
            amount,
            committed,
            ..
        } => format!("{from} committed {amount} (total {committed})"),
        EscrowEvent::Accepted { party, role, .. } => format!("{party} ({role}) accepts"),
        EscrowEvent::Cancelled { party, role, .. } => format!("{party} ({role}) cancels"),
        EscrowEvent::Settled {
            status: s,
            sender_share,
            receiver_share,
            ..
        } => format!(
            "{} sender {sender_share}, receiver {receiver_share}",
            status(*s)
        ),
        EscrowEvent::Resolved {
            by,
            status: s,
            sender_share,
            receiver_share,
            ..
        } => format!(
            "{} by {by}: sender {sender_share}, receiver {receiver_share}",
            status(*s)
        ),
    };

    println!(
        "    {} {} {:<14} {}",
        format!("#{sequence:<3}").bright_black(),
        event.transaction_id().to_string().bright_white(),
        event.name().bright_magenta(),
        detail
    );
}
