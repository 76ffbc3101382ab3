//! EscrowKit Registry - multi-party escrow with optional arbitration
//!
//! A sender locks value toward a goal for a receiver. The two parties vote to
//! accept or cancel; agreement settles the transaction, disagreement waits
//! for a broker or the deadline. Value moves through an
//! [`EscrowLedger`](escrowkit_ledger::EscrowLedger) and every transition is
//! published to an [`EventSink`].
//!
//! # Example
//!
//! ```ignore
//! let ledger = Arc::new(InMemoryLedger::new());
//! let registry = EscrowRegistry::new(RegistryConfig::default(), ledger);
//!
//! let id = registry.create(&alice, CreateTransaction::new(
//!     "alice", "bob", Amount::new(1000), deadline, Terms::BackToReceiver,
//! )).await?;
//! registry.commit(id, &alice, Amount::new(1000)).await?;
//! registry.accept(id, &alice).await?;
//! registry.accept(id, &bob).await?; // settles: bob receives 1000
//! ```
//!
//! # Concurrency
//!
//! Operations on one transaction are serialized; operations on different
//! transactions run in parallel. A failed operation changes nothing.

pub mod clock;
pub mod config;
pub mod distribution;
pub mod events;
pub mod gate;
pub mod machine;
pub mod registry;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::RegistryConfig;
pub use distribution::{distribute, settle};
pub use events::{
    BroadcastEventSink, EventSink, FanoutEventSink, MemoryEventSink, NullEventSink,
    TracingEventSink,
};
pub use gate::{authorize, Operation};
pub use machine::VoteEffect;
pub use registry::{ActionResult, EscrowRegistry};
