//! Core library for the market-scout marketplace watcher.
//!
//! The pipeline turns noisy, repeatedly-refreshed page snapshots into a
//! stable, deduplicated, queryable set of listings: extraction
//! ([`scrapers::extract`]), cycle control ([`scrapers::controller`]),
//! deduplication ([`dedup`]), title classification ([`classify`]),
//! store reconciliation ([`sync`]) and the dashboard view-model ([`view`]).

pub mod classify;
pub mod config;
pub mod dedup;
pub mod export;
pub mod models;
pub mod scrapers;
pub mod store;
pub mod sync;
pub mod view;
