//! # Shared Bus - In-Process Chain Event Bus
//!
//! Internal choreography channel for cases a `ChainHandle` call can't
//! express directly: a `Syncer` waiting on another group's progress,
//! a query layer observing chain growth, tests asserting on side effects.
//!
//! ## Choreography Pattern
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ Chain A      │                    │ Observer     │
//! │              │    publish()       │              │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```
//!
//! ## Trx dedup
//!
//! `TrxDedupCache` guards against double-applying a trx that arrived
//! twice over an at-least-once transport.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod dedup_cache;
pub mod events;
pub mod publisher;
pub mod subscriber;

pub use dedup_cache::TrxDedupCache;
pub use events::{ChainEvent, EventFilter, EventTopic};
pub use publisher::{ChainEventBus, EventPublisher};
pub use subscriber::{EventStream, EventSubscriber, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before backpressure.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
