//! The escrow registry
//!
//! Entry point for every escrow operation. Each call follows the same path:
//!
//! ```text
//! caller → gate::authorize → machine transition (on a working copy)
//!        → distribution::settle (terminal only) → ledger payout
//!        → write-back → event log
//! ```
//!
//! The working copy is written back only after the ledger succeeded, so an
//! error at any step leaves the stored transaction exactly as it was.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use escrowkit_ledger::{EscrowLedger, Payout};
use escrowkit_types::{
    AccountId, Action, Amount, CreateTransaction, EscrowError, EscrowEvent, Outcome, Result, Role,
    Settlement, Status, Transaction, TransactionId,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::RegistryConfig;
use crate::distribution;
use crate::events::{EventLog, EventSink, NullEventSink};
use crate::gate::{self, Operation};
use crate::machine::{self, VoteEffect};
use crate::store::TransactionStore;

/// Result of a party action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    /// The transaction after the action
    pub transaction: Transaction,
    /// Present when the action settled the transaction
    pub settlement: Option<Settlement>,
    /// False when the action repeated an earlier vote
    pub changed: bool,
}

/// Registry of escrow transactions
pub struct EscrowRegistry {
    config: RegistryConfig,
    store: TransactionStore,
    ledger: Arc<dyn EscrowLedger>,
    clock: Arc<dyn Clock>,
    events: EventLog,
}

impl EscrowRegistry {
    /// Create a registry on the system clock that discards events
    pub fn new(config: RegistryConfig, ledger: Arc<dyn EscrowLedger>) -> Self {
        Self {
            config,
            store: TransactionStore::new(),
            ledger,
            clock: Arc::new(SystemClock),
            events: EventLog::new(Arc::new(NullEventSink)),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = EventLog::new(sink);
        self
    }

    /// Account that owns this registry
    pub fn owner(&self) -> &AccountId {
        &self.config.owner
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Number of transactions ever created
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ========================================================================
    // Transaction Store
    // ========================================================================

    /// Open a new escrow transaction
    ///
    /// A non-zero `initial_value` is pulled from the sender, which then has to
    /// be the caller. Ids are allocated sequentially from 0; a creation that
    /// fails does not consume one.
    pub async fn create(
        &self,
        caller: &AccountId,
        request: CreateTransaction,
    ) -> Result<TransactionId> {
        let now = self.clock.now();
        self.validate_create(&request, now)?;

        if !request.initial_value.is_zero() && caller != &request.sender {
            warn!(caller = %caller, sender = %request.sender, "Rejected pre-funding by non-sender");
            return Err(EscrowError::unauthorized(None, caller, "pre-fund a transaction"));
        }

        let mut next_id = self.store.lock_next_id().await;
        let id = *next_id;

        if !request.initial_value.is_zero() {
            self.ledger
                .transfer_in(id, &request.sender, request.initial_value)
                .await
                .map_err(|e| {
                    warn!(tx = %id, error = %e, "Pre-funding failed");
                    EscrowError::from(e)
                })?;
        }

        let tx = Transaction {
            id,
            sender: request.sender,
            receiver: request.receiver,
            broker: request.broker,
            goal: request.goal,
            deadline: request.deadline,
            terms: request.terms,
            committed: request.initial_value,
            status: Status::Ongoing,
            sender_action: Action::None,
            receiver_action: Action::None,
            created_at: now,
            settled_at: None,
            settlement: None,
        };

        let mut events = vec![EscrowEvent::NewTransaction {
            transaction_id: id,
            sender: tx.sender.clone(),
            receiver: tx.receiver.clone(),
            broker: tx.broker.clone(),
            goal: tx.goal,
            deadline: tx.deadline,
            terms: tx.terms,
        }];
        if !tx.committed.is_zero() {
            events.push(EscrowEvent::FundsCommitted {
                transaction_id: id,
                from: tx.sender.clone(),
                amount: tx.committed,
                committed: tx.committed,
            });
        }

        info!(
            tx = %id,
            sender = %tx.sender,
            receiver = %tx.receiver,
            broker = ?tx.broker.as_ref().map(|b| b.as_str()),
            goal = %tx.goal,
            terms = %tx.terms,
            committed = %tx.committed,
            "Escrow transaction created"
        );

        // Recorded before the record is reachable, so no call on `id` can
        // emit ahead of NewTransaction.
        self.events.emit_all(now, events);
        self.store.insert(&mut next_id, tx);
        Ok(id)
    }

    fn validate_create(&self, request: &CreateTransaction, now: DateTime<Utc>) -> Result<()> {
        if request.goal.is_zero() {
            return Err(EscrowError::invalid_parameters("goal must be greater than zero"));
        }
        if request.deadline <= now {
            return Err(EscrowError::invalid_parameters(
                "deadline must be strictly in the future",
            ));
        }
        if let Some(horizon) = self.config.max_deadline_horizon() {
            if request.deadline - now > horizon {
                return Err(EscrowError::invalid_parameters(format!(
                    "deadline is more than {}s away",
                    horizon.num_seconds()
                )));
            }
        }
        if request.sender == request.receiver {
            return Err(EscrowError::invalid_parameters(
                "sender and receiver must differ",
            ));
        }
        if let Some(broker) = &request.broker {
            if broker == &request.sender || broker == &request.receiver {
                return Err(EscrowError::invalid_parameters(
                    "broker must differ from sender and receiver",
                ));
            }
        }
        Ok(())
    }

    /// Get a copy of a transaction
    pub async fn get(&self, id: TransactionId) -> Result<Transaction> {
        self.store.snapshot(id).await
    }

    /// Every transaction in id order
    pub async fn list(&self) -> Vec<Transaction> {
        self.store.snapshots(|_| true).await
    }

    /// Every transaction in which `account` is sender, receiver or broker
    pub async fn transactions_for(&self, account: &AccountId) -> Vec<Transaction> {
        self.store.involving(account).await
    }

    /// Add value from the sender toward the goal
    pub async fn commit(
        &self,
        id: TransactionId,
        from: &AccountId,
        value: Amount,
    ) -> Result<Transaction> {
        let handle = self.store.handle(id)?;
        let mut tx = handle.lock().await;
        let now = self.clock.now();

        self.authorize(&tx, from, Operation::Commit, now)?;

        if value.is_zero() {
            return Err(EscrowError::invalid_amount("commitment must be greater than zero"));
        }
        let committed = tx
            .committed
            .checked_add(value)
            .ok_or_else(|| EscrowError::invalid_amount("commitment overflows the running total"))?;

        self.ledger.transfer_in(id, from, value).await.map_err(|e| {
            warn!(tx = %id, from = %from, error = %e, "Commitment transfer failed");
            EscrowError::from(e)
        })?;
        tx.committed = committed;

        debug!(tx = %id, amount = %value, committed = %committed, "Funds committed");
        self.events.emit(
            now,
            EscrowEvent::FundsCommitted {
                transaction_id: id,
                from: from.clone(),
                amount: value,
                committed,
            },
        );
        Ok(tx.clone())
    }

    // ========================================================================
    // State Machine
    // ========================================================================

    /// Vote to accept; both accepts settle the transaction by its terms
    pub async fn accept(&self, id: TransactionId, caller: &AccountId) -> Result<ActionResult> {
        self.vote(id, caller, Action::Accept).await
    }

    /// Vote to cancel; both cancels refund the sender
    pub async fn cancel(&self, id: TransactionId, caller: &AccountId) -> Result<ActionResult> {
        self.vote(id, caller, Action::Cancel).await
    }

    async fn vote(&self, id: TransactionId, caller: &AccountId, action: Action) -> Result<ActionResult> {
        let op = match action {
            Action::Cancel => Operation::Cancel,
            _ => Operation::Accept,
        };

        let handle = self.store.handle(id)?;
        let mut tx = handle.lock().await;
        let now = self.clock.now();

        let role = self.authorize(&tx, caller, op, now)?;

        if action == Action::Accept && !tx.is_funded() {
            return Err(EscrowError::invalid_state(
                id,
                format!("goal not reached, {} still to commit", tx.remaining_to_goal()),
            ));
        }

        let mut next = tx.clone();
        let effect = machine::record_vote(&mut next, role, action);

        let vote_event = match action {
            Action::Cancel => EscrowEvent::Cancelled {
                transaction_id: id,
                party: caller.clone(),
                role,
            },
            _ => EscrowEvent::Accepted {
                transaction_id: id,
                party: caller.clone(),
                role,
            },
        };

        match effect {
            VoteEffect::Unchanged => Ok(ActionResult {
                transaction: tx.clone(),
                settlement: None,
                changed: false,
            }),
            VoteEffect::Recorded => {
                *tx = next;
                debug!(tx = %id, role = %role, action = ?action, disputed = tx.is_disputed(), "Vote recorded");
                self.events.emit(now, vote_event);
                Ok(ActionResult {
                    transaction: tx.clone(),
                    settlement: None,
                    changed: true,
                })
            }
            VoteEffect::Completed(outcome) => {
                let settlement = distribution::settle(outcome, next.terms, next.committed);
                self.pay_out(&next, &settlement).await?;
                machine::finalize(&mut next, settlement, now);
                *tx = next;

                info!(
                    tx = %id,
                    status = %settlement.status,
                    sender_share = %settlement.sender_share,
                    receiver_share = %settlement.receiver_share,
                    "Escrow settled by agreement"
                );
                self.events.emit_all(
                    now,
                    vec![
                        vote_event,
                        EscrowEvent::Settled {
                            transaction_id: id,
                            status: settlement.status,
                            sender_share: settlement.sender_share,
                            receiver_share: settlement.receiver_share,
                        },
                    ],
                );
                Ok(ActionResult {
                    transaction: tx.clone(),
                    settlement: Some(settlement),
                    changed: true,
                })
            }
        }
    }

    /// Force the terminal transition, splitting funds by the terms
    ///
    /// Available to the broker after the deadline or while the parties
    /// disagree, and to either party after the deadline when there is no
    /// broker.
    pub async fn resolve(&self, id: TransactionId, caller: &AccountId) -> Result<Settlement> {
        let handle = self.store.handle(id)?;
        let mut tx = handle.lock().await;
        let now = self.clock.now();

        self.authorize(&tx, caller, Operation::Resolve, now)?;

        let mut next = tx.clone();
        let settlement = distribution::settle(Outcome::Arbitrated, next.terms, next.committed);
        self.pay_out(&next, &settlement).await?;
        machine::finalize(&mut next, settlement, now);
        *tx = next;

        info!(
            tx = %id,
            by = %caller,
            status = %settlement.status,
            sender_share = %settlement.sender_share,
            receiver_share = %settlement.receiver_share,
            "Escrow resolved"
        );
        self.events.emit(
            now,
            EscrowEvent::Resolved {
                transaction_id: id,
                by: caller.clone(),
                status: settlement.status,
                sender_share: settlement.sender_share,
                receiver_share: settlement.receiver_share,
            },
        );
        Ok(settlement)
    }

    // ========================================================================
    // Authorization Gate
    // ========================================================================

    /// Whether `caller` could resolve `id` right now
    pub async fn can_resolve(&self, id: TransactionId, caller: &AccountId) -> Result<bool> {
        let tx = self.store.snapshot(id).await?;
        Ok(gate::authorize(&tx, caller, Operation::Resolve, self.clock.now()).is_ok())
    }

    fn authorize(
        &self,
        tx: &Transaction,
        caller: &AccountId,
        op: Operation,
        now: DateTime<Utc>,
    ) -> Result<Role> {
        gate::authorize(tx, caller, op, now).map_err(|e| {
            match &e {
                EscrowError::Unauthorized { .. } => {
                    warn!(tx = %tx.id, caller = %caller, op = %op, "Unauthorized escrow call")
                }
                _ => debug!(tx = %tx.id, caller = %caller, op = %op, error = %e, "Escrow call rejected"),
            }
            e
        })
    }

    // ========================================================================
    // Payout
    // ========================================================================

    async fn pay_out(&self, tx: &Transaction, settlement: &Settlement) -> Result<()> {
        debug_assert_eq!(settlement.total(), tx.committed);

        let payouts = [
            Payout::new(tx.sender.clone(), settlement.sender_share),
            Payout::new(tx.receiver.clone(), settlement.receiver_share),
        ];
        self.ledger.payout(tx.id, &payouts).await.map_err(|e| {
            warn!(tx = %tx.id, error = %e, "Payout failed, transaction left unchanged");
            EscrowError::from(e)
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::events::MemoryEventSink;
    use chrono::Duration;
    use escrowkit_ledger::InMemoryLedger;
    use escrowkit_types::Terms;

    struct Fixture {
        registry: EscrowRegistry,
        ledger: InMemoryLedger,
        clock: Arc<ManualClock>,
        sink: Arc<MemoryEventSink>,
    }

    async fn fixture() -> Fixture {
        let ledger = InMemoryLedger::new();
        ledger
            .deposit(&"alice".into(), Amount::new(10_000), "seed")
            .await
            .unwrap();
        let clock = Arc::new(ManualClock::starting_now());
        let sink = Arc::new(MemoryEventSink::new());
        let registry = EscrowRegistry::new(RegistryConfig::default(), Arc::new(ledger.clone()))
            .with_clock(clock.clone())
            .with_event_sink(sink.clone());
        Fixture {
            registry,
            ledger,
            clock,
            sink,
        }
    }

    fn request(f: &Fixture, terms: Terms) -> CreateTransaction {
        CreateTransaction::new(
            "alice",
            "bob",
            Amount::new(1000),
            f.clock.now() + Duration::hours(1),
            terms,
        )
    }

    fn a(s: &str) -> AccountId {
        AccountId::new(s)
    }

    #[tokio::test]
    async fn test_create_validation() {
        let f = fixture().await;
        let now = f.clock.now();

        let mut r = request(&f, Terms::HalfHalf);
        r.goal = Amount::zero();
        assert!(matches!(
            f.registry.create(&a("alice"), r).await,
            Err(EscrowError::InvalidParameters { .. })
        ));

        let mut r = request(&f, Terms::HalfHalf);
        r.deadline = now;
        assert!(matches!(
            f.registry.create(&a("alice"), r).await,
            Err(EscrowError::InvalidParameters { .. })
        ));

        let mut r = request(&f, Terms::HalfHalf);
        r.receiver = a("alice");
        assert!(matches!(
            f.registry.create(&a("alice"), r).await,
            Err(EscrowError::InvalidParameters { .. })
        ));

        let r = request(&f, Terms::HalfHalf).with_broker("bob");
        assert!(matches!(
            f.registry.create(&a("alice"), r).await,
            Err(EscrowError::InvalidParameters { .. })
        ));

        assert!(f.registry.is_empty());
        assert!(f.sink.is_empty());
    }

    #[tokio::test]
    async fn test_deadline_horizon() {
        let ledger = InMemoryLedger::new();
        let clock = Arc::new(ManualClock::starting_now());
        let registry = EscrowRegistry::new(
            RegistryConfig::default().with_max_deadline_horizon(3600),
            Arc::new(ledger),
        )
        .with_clock(clock.clone());

        let far = CreateTransaction::new(
            "alice",
            "bob",
            Amount::new(1),
            clock.now() + Duration::hours(2),
            Terms::HalfHalf,
        );
        assert!(matches!(
            registry.create(&a("alice"), far).await,
            Err(EscrowError::InvalidParameters { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_emits_new_transaction_with_sequential_ids() {
        let f = fixture().await;

        let first = f
            .registry
            .create(&a("alice"), request(&f, Terms::BackToSender))
            .await
            .unwrap();
        let second = f
            .registry
            .create(&a("carol"), request(&f, Terms::HalfHalf).with_broker("carol"))
            .await
            .unwrap();

        assert_eq!(first, TransactionId::new(0));
        assert_eq!(second, TransactionId::new(1));
        assert_eq!(f.sink.count("NewTransaction"), 2);
        match &f.sink.events()[1] {
            EscrowEvent::NewTransaction { broker, terms, .. } => {
                assert_eq!(broker.as_ref(), Some(&a("carol")));
                assert_eq!(*terms, Terms::HalfHalf);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_prefunding_requires_sender_and_funds() {
        let f = fixture().await;

        let r = request(&f, Terms::HalfHalf).with_initial_value(Amount::new(500));
        assert!(matches!(
            f.registry.create(&a("bob"), r).await,
            Err(EscrowError::Unauthorized { .. })
        ));

        let r = request(&f, Terms::HalfHalf).with_initial_value(Amount::new(50_000));
        assert!(matches!(
            f.registry.create(&a("alice"), r).await,
            Err(EscrowError::LedgerFailure { .. })
        ));
        assert!(f.registry.is_empty());

        let r = request(&f, Terms::HalfHalf).with_initial_value(Amount::new(500));
        let id = f.registry.create(&a("alice"), r).await.unwrap();
        assert_eq!(id, TransactionId::new(0));
        assert_eq!(f.registry.get(id).await.unwrap().committed, Amount::new(500));
        assert_eq!(f.ledger.escrowed_for(id).await, Amount::new(500));
        assert_eq!(f.sink.count("FundsCommitted"), 1);
    }

    #[tokio::test]
    async fn test_commit_rules() {
        let f = fixture().await;
        let id = f
            .registry
            .create(&a("alice"), request(&f, Terms::HalfHalf))
            .await
            .unwrap();

        assert!(matches!(
            f.registry.commit(id, &a("bob"), Amount::new(10)).await,
            Err(EscrowError::Unauthorized { .. })
        ));
        assert!(matches!(
            f.registry.commit(id, &a("alice"), Amount::zero()).await,
            Err(EscrowError::InvalidAmount { .. })
        ));
        assert!(matches!(
            f.registry.commit(TransactionId::new(42), &a("alice"), Amount::new(1)).await,
            Err(EscrowError::NotFound { .. })
        ));

        let tx = f.registry.commit(id, &a("alice"), Amount::new(600)).await.unwrap();
        assert_eq!(tx.committed, Amount::new(600));
        let tx = f.registry.commit(id, &a("alice"), Amount::new(600)).await.unwrap();
        assert_eq!(tx.committed, Amount::new(1200));
        assert_eq!(f.ledger.escrowed_for(id).await, Amount::new(1200));
    }

    #[tokio::test]
    async fn test_accept_requires_goal() {
        let f = fixture().await;
        let id = f
            .registry
            .create(&a("alice"), request(&f, Terms::HalfHalf))
            .await
            .unwrap();
        f.registry.commit(id, &a("alice"), Amount::new(999)).await.unwrap();

        assert!(matches!(
            f.registry.accept(id, &a("bob")).await,
            Err(EscrowError::InvalidState { .. })
        ));

        // Cancelling an underfunded transaction is always possible.
        let result = f.registry.cancel(id, &a("bob")).await.unwrap();
        assert!(result.changed);
    }

    #[tokio::test]
    async fn test_mutual_cancel_refunds_sender() {
        let f = fixture().await;
        let id = f
            .registry
            .create(&a("alice"), request(&f, Terms::BackToReceiver))
            .await
            .unwrap();
        f.registry.commit(id, &a("alice"), Amount::new(1000)).await.unwrap();

        f.registry.cancel(id, &a("alice")).await.unwrap();
        let result = f.registry.cancel(id, &a("bob")).await.unwrap();

        let settlement = result.settlement.unwrap();
        assert_eq!(result.transaction.status, Status::Cancelled);
        assert_eq!(settlement.outcome, Outcome::Withdrawn);
        assert_eq!(f.ledger.balance(&a("alice")).await, Amount::new(10_000));
        assert_eq!(f.ledger.balance(&a("bob")).await, Amount::zero());
        assert_eq!(f.sink.count("Settled"), 1);
    }

    #[tokio::test]
    async fn test_broker_resolves_dispute_before_deadline() {
        let f = fixture().await;
        let id = f
            .registry
            .create(&a("alice"), request(&f, Terms::BackToReceiver).with_broker("carol"))
            .await
            .unwrap();
        f.registry.commit(id, &a("alice"), Amount::new(1000)).await.unwrap();

        assert!(!f.registry.can_resolve(id, &a("carol")).await.unwrap());
        f.registry.accept(id, &a("alice")).await.unwrap();
        f.registry.cancel(id, &a("bob")).await.unwrap();
        assert!(f.registry.can_resolve(id, &a("carol")).await.unwrap());
        assert!(!f.registry.can_resolve(id, &a("alice")).await.unwrap());

        let settlement = f.registry.resolve(id, &a("carol")).await.unwrap();
        assert_eq!(settlement.status, Status::Fulfilled);
        assert_eq!(f.ledger.balance(&a("bob")).await, Amount::new(1000));

        let tx = f.registry.get(id).await.unwrap();
        assert_eq!(tx.settlement, Some(settlement));
        assert_eq!(tx.settled_at, Some(f.clock.now()));
    }

    #[tokio::test]
    async fn test_queries() {
        let f = fixture().await;
        f.registry
            .create(&a("alice"), request(&f, Terms::HalfHalf))
            .await
            .unwrap();
        f.registry
            .create(
                &a("dave"),
                CreateTransaction::new(
                    "dave",
                    "erin",
                    Amount::new(5),
                    f.clock.now() + Duration::minutes(5),
                    Terms::HalfHalf,
                ),
            )
            .await
            .unwrap();

        assert_eq!(f.registry.owner(), &a("owner"));
        assert_eq!(f.registry.len(), 2);
        assert_eq!(f.registry.list().await.len(), 2);
        assert_eq!(f.registry.transactions_for(&a("bob")).await.len(), 1);
        assert_eq!(f.registry.transactions_for(&a("zed")).await.len(), 0);
    }
}
