//! The two periodic jobs: discovery fills the queue, the worker drains it.
//!
//! Both coordinate only through the store; each `run_once` is one tick.

pub mod discoverer;
pub mod worker;

pub use discoverer::{DiscoverSummary, Discoverer, DiscovererConfig};
pub use worker::{Worker, WorkerConfig, WorkerOutcome};
