//! Demo command - escrow scenarios against an in-memory ledger
//!
//! Each scenario runs on a fresh registry with a manual clock, so deadlines
//! can be crossed instantly.

use std::sync::Arc;

use chrono::Duration;
use clap::ValueEnum;
use colored::*;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::info;

use escrowkit_ledger::InMemoryLedger;
use escrowkit_registry::{
    BroadcastEventSink, Clock, EscrowRegistry, FanoutEventSink, ManualClock, MemoryEventSink,
    RegistryConfig, TracingEventSink,
};
use escrowkit_types::{AccountId, Amount, CreateTransaction, EscrowError, Terms, TransactionId};

use crate::display;

/// Scenarios the demo can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Both parties accept, funds go back to the sender
    Agree,
    /// Both parties accept an odd amount split half-half
    Split,
    /// The parties disagree and the deadline unlocks resolve
    Dispute,
    /// Run every scenario
    All,
}

impl Scenario {
    fn expand(self) -> Vec<Scenario> {
        match self {
            Scenario::All => vec![Scenario::Agree, Scenario::Split, Scenario::Dispute],
            other => vec![other],
        }
    }
}

/// Everything a scenario needs
struct Stage {
    registry: EscrowRegistry,
    ledger: InMemoryLedger,
    clock: Arc<ManualClock>,
    events: Arc<MemoryEventSink>,
    live: BroadcastEventSink,
    alice: AccountId,
    bob: AccountId,
}

impl Stage {
    async fn new(config: &RegistryConfig) -> anyhow::Result<Self> {
        let alice = AccountId::new("alice");
        let bob = AccountId::new("bob");

        let ledger = InMemoryLedger::new();
        ledger.deposit(&alice, Amount::new(10_000), "demo funding").await?;

        let clock = Arc::new(ManualClock::starting_now());
        let events = Arc::new(MemoryEventSink::new());
        let live = BroadcastEventSink::new(config.event_buffer);
        let sink = FanoutEventSink::new()
            .with(events.clone())
            .with(Arc::new(live.clone()))
            .with(Arc::new(TracingEventSink));

        let registry = EscrowRegistry::new(config.clone(), Arc::new(ledger.clone()))
            .with_clock(clock.clone())
            .with_event_sink(Arc::new(sink));

        Ok(Self {
            registry,
            ledger,
            clock,
            events,
            live,
            alice,
            bob,
        })
    }

    async fn open(&self, goal: u64, terms: Terms) -> anyhow::Result<TransactionId> {
        let request = CreateTransaction::new(
            self.alice.clone(),
            self.bob.clone(),
            Amount::new(goal),
            self.clock.now() + Duration::hours(24),
            terms,
        );
        let id = self.registry.create(&self.alice, request).await?;
        display::success(&format!("Opened {id}: goal {goal}, terms {terms}"));

        self.registry.commit(id, &self.alice, Amount::new(goal)).await?;
        display::success(&format!("alice committed {goal}"));
        Ok(id)
    }

    async fn report(&self, id: TransactionId) -> anyhow::Result<()> {
        let tx = self.registry.get(id).await?;
        println!();
        display::kv("status", &display::status(tx.status).to_string());
        display::kv("alice", &self.ledger.balance(&self.alice).await.to_string());
        display::kv("bob", &self.ledger.balance(&self.bob).await.to_string());
        display::kv("escrowed", &self.ledger.escrowed_for(id).await.to_string());

        println!();
        for record in self.events.records() {
            display::event(record.sequence, &record.event);
        }
        Ok(())
    }
}

/// Run the selected scenarios
pub async fn run(scenario: Scenario) -> anyhow::Result<()> {
    let config = RegistryConfig::from_env();

    println!("{}", "EscrowKit demo".bright_white().bold());
    display::info(&format!("registry owner: {}", config.owner));

    for scenario in scenario.expand() {
        info!(?scenario, event_buffer = config.event_buffer, "Running escrow scenario");
        let stage = Stage::new(&config).await?;
        let mut observer = stage.live.subscribe();

        match scenario {
            Scenario::Agree => agree(&stage).await?,
            Scenario::Split => split(&stage).await?,
            Scenario::Dispute => dispute(&stage).await?,
            Scenario::All => unreachable!("expanded above"),
        }

        let mut observed = 0usize;
        loop {
            match observer.try_recv() {
                Ok(_) => observed += 1,
                Err(TryRecvError::Lagged(skipped)) => observed += skipped as usize,
                Err(_) => break,
            }
        }
        display::info(&format!("{observed} events delivered to live subscribers"));
    }

    println!();
    Ok(())
}

async fn agree(stage: &Stage) -> anyhow::Result<()> {
    display::section("Scenario: mutual agreement (back to sender)");

    let id = stage.open(1000, Terms::BackToSender).await?;
    stage.registry.accept(id, &stage.alice).await?;
    display::info("alice accepts");
    let result = stage.registry.accept(id, &stage.bob).await?;
    display::info("bob accepts");

    if let Some(settlement) = result.settlement {
        display::success(&format!(
            "Settled: sender {}, receiver {}",
            settlement.sender_share, settlement.receiver_share
        ));
    }
    stage.report(id).await
}

async fn split(stage: &Stage) -> anyhow::Result<()> {
    display::section("Scenario: half-half split of an odd amount");

    let id = stage.open(1001, Terms::HalfHalf).await?;
    stage.registry.accept(id, &stage.bob).await?;
    display::info("bob accepts");
    let result = stage.registry.accept(id, &stage.alice).await?;
    display::info("alice accepts");

    if let Some(settlement) = result.settlement {
        display::success(&format!(
            "Settled: sender {}, receiver {} (odd unit to the receiver)",
            settlement.sender_share, settlement.receiver_share
        ));
    }
    stage.report(id).await
}

async fn dispute(stage: &Stage) -> anyhow::Result<()> {
    display::section("Scenario: dispute without a broker");

    let id = stage.open(1000, Terms::BackToReceiver).await?;
    stage.registry.accept(id, &stage.alice).await?;
    display::info("alice accepts");
    stage.registry.cancel(id, &stage.bob).await?;
    display::info("bob cancels, the transaction is disputed");

    match stage.registry.resolve(id, &stage.bob).await {
        Err(EscrowError::InvalidState { reason, .. }) => {
            display::error(&format!("resolve before the deadline: {reason}"))
        }
        Err(e) => return Err(e.into()),
        Ok(_) => anyhow::bail!("resolve succeeded before the deadline"),
    }

    stage.clock.advance(Duration::hours(24) + Duration::seconds(1));
    display::info("deadline passes");

    let settlement = stage.registry.resolve(id, &stage.bob).await?;
    display::success(&format!(
        "Resolved by bob: sender {}, receiver {}",
        settlement.sender_share, settlement.receiver_share
    ));
    stage.report(id).await
}
