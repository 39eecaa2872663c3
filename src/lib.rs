//! # Sortboard
//!
//! Telemetry ingest and dashboard backend for a waste-sorting station.
//!
//! A sorting device uploads batched telemetry (individual classification
//! events plus daily aggregate counts), which Sortboard validates, applies
//! to SQLite in one transaction, and materializes into static JSON
//! snapshots for the dashboard. Live query endpoints read the same storage
//! directly.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌───────────┐   ┌───────────┐   ┌──────────┐
//! │  Sorting   │──▶│ Validator │──▶│   Batch   │──▶│  SQLite  │
//! │  device    │   │ (envelope)│   │ processor │   │   WAL    │
//! └────────────┘   └───────────┘   └───────────┘   └────┬─────┘
//!                                        │              │
//!                                        ▼              ▼
//!                                  ┌──────────┐   ┌──────────┐
//!                                  │ Snapshot │   │  Query   │
//!                                  │ artifacts│   │   API    │
//!                                  └──────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! sortboard init                    # create database
//! sortboard ingest batch.json      # apply one batch payload
//! sortboard snapshot               # regenerate JSON artifacts
//! sortboard serve                  # start the dashboard API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`validate`] | Batch envelope validation |
//! | [`ingest`] | Transactional batch processing |
//! | [`store`] | Keyed storage: upserts, scans, aggregates |
//! | [`snapshot`] | Static JSON artifact materialization |
//! | [`query`] | Live dashboard reads |
//! | [`export`] | CSV export |
//! | [`server`] | Dashboard HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema setup |

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod query;
pub mod server;
pub mod snapshot;
pub mod status;
pub mod store;
pub mod validate;
