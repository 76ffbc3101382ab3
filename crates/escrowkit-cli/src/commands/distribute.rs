//! Distribute command - payout split calculator

use colored::*;
use serde::Serialize;

use escrowkit_registry::settle;
use escrowkit_types::{Amount, Outcome, Status, Terms};

/// Split of one committed amount under every outcome
#[derive(Debug, Serialize)]
struct SplitReport {
    committed: Amount,
    terms: Terms,
    outcomes: Vec<OutcomeRow>,
}

#[derive(Debug, Serialize)]
struct OutcomeRow {
    outcome: Outcome,
    status: Status,
    sender_share: Amount,
    receiver_share: Amount,
}

fn report(committed: Amount, terms: Terms) -> SplitReport {
    let outcomes = [Outcome::Agreed, Outcome::Withdrawn, Outcome::Arbitrated]
        .into_iter()
        .map(|outcome| {
            let s = settle(outcome, terms, committed);
            OutcomeRow {
                outcome,
                status: s.status,
                sender_share: s.sender_share,
                receiver_share: s.receiver_share,
            }
        })
        .collect();

    SplitReport {
        committed,
        terms,
        outcomes,
    }
}

fn outcome_label(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Agreed => "mutual accept",
        Outcome::Withdrawn => "mutual cancel",
        Outcome::Arbitrated => "resolve",
    }
}

/// Print how `committed` would be paid out under `terms`
pub fn run(committed: u64, terms: Terms, json: bool) -> anyhow::Result<()> {
    let report = report(Amount::new(committed), terms);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} {} under {}",
        "Committed".bright_white().bold(),
        report.committed.to_string().bright_cyan(),
        report.terms.to_string().bright_cyan()
    );
    println!();
    println!(
        "  {:<14} {:<10} {:>20} {:>20}",
        "outcome", "status", "sender", "receiver"
    );
    println!("  {}", "─".repeat(67).bright_black());
    for row in &report.outcomes {
        println!(
            "  {:<14} {:<10} {:>20} {:>20}",
            outcome_label(row.outcome),
            row.status.to_string(),
            row.sender_share.to_string(),
            row.receiver_share.to_string()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_covers_every_outcome() {
        let r = report(Amount::new(1001), Terms::HalfHalf);
        assert_eq!(r.outcomes.len(), 3);

        let agreed = &r.outcomes[0];
        assert_eq!(agreed.sender_share, Amount::new(500));
        assert_eq!(agreed.receiver_share, Amount::new(501));

        let withdrawn = &r.outcomes[1];
        assert_eq!(withdrawn.status, Status::Cancelled);
        assert_eq!(withdrawn.sender_share, Amount::new(1001));
    }

    #[test]
    fn test_report_serializes_snake_case() {
        let r = report(Amount::new(10), Terms::BackToReceiver);
        let value = serde_json::to_value(&r).unwrap();
        assert_eq!(value["terms"], "back_to_receiver");
        assert_eq!(value["committed"], 10);
        assert_eq!(value["outcomes"][2]["status"], "fulfilled");
    }
}
