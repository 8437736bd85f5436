//! Actor-based producers
//!
//! Each producer runs as an independent unit communicating via Tokio channels
//! and sharing only the store.
//!
//! ## Architecture Overview
//!
//! ```text
//!                     ┌─────────────────┐
//!                     │   Supervisor    │
//!                     └────────┬────────┘
//!                              │ spawns (child cancellation tokens)
//!          ┌───────────────────┼────────────────────┐
//!          │                   │                    │
//!  ┌───────▼───────┐   ┌───────▼────────┐   ┌───────▼───────┐
//!  │  Collector    │   │ Activity intake│◄──│ Capture thread│ (one per provider)
//!  │  (ticks)      │   │ (queue)        │   │ sink.record() │
//!  └───────┬───────┘   └───────┬────────┘   └───────────────┘
//!          │                   │
//!          └─────────┬─────────┘
//!                    │ append / upsert
//!          ┌─────────▼──────────┐
//!          │   TelemetryStore   │◄──── Dashboard (reads)
//!          └────────────────────┘
//! ```
//!
//! ## Actor Types
//!
//! - **MetricCollectorActor**: Samples the host at a fixed interval, persists
//!   the sample and upserts alerts
//! - **ActivitySink**: Queues events from capture providers and persists them
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: mpsc command channel for control messages
//! 2. **Reports**: per-tick outcomes on a broadcast channel
//! 3. **Request/Response**: oneshot channels for synchronous queries

pub mod activity;
pub mod capture;
pub mod collector;
pub mod messages;
