//! # Project Pulse
//!
//! Snapshot ingestion and team analytics for GitHub Projects (v2) boards.
//!
//! Project Pulse pages through every item of an organization project via the
//! GraphQL API, flattens each item into a uniform record, persists the run as
//! a dated CSV snapshot, and derives delivery metrics (completion rate, cycle
//! time, monthly trends, workload, label frequency, flagged items) from it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────┐
//! │   GitHub    │──▶│  Normalize  │──▶│   CSV    │
//! │  GraphQL    │   │  + Assemble │   │ snapshot │
//! └─────────────┘   └─────────────┘   └────┬─────┘
//!                                          │
//!                                          ▼
//!                                    ┌──────────┐
//!                                    │ Metrics  │──▶ text / JSON
//!                                    └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export GITHUB_TOKEN=...
//! pulse sync                     # fetch and save a snapshot
//! pulse report                   # dashboard for the newest snapshot
//! pulse report --since 2024-01-01 --format json
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Typed library errors |
//! | [`models`] | Wire types and the normalized record |
//! | [`client`] | GraphQL transport and item pagination |
//! | [`normalize`] | Raw item → record flattening |
//! | [`snapshot`] | Page assembly into an immutable snapshot |
//! | [`store`] | CSV persistence and snapshot discovery |
//! | [`metrics`] | Analytics engine |
//! | [`report`] | Text and JSON dashboards |

pub mod client;
pub mod config;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod report;
pub mod snapshot;
pub mod status;
pub mod store;
