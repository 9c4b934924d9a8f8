//! Twilio Communications Library
//!
//! This library wraps the Twilio REST API (Lookup, Messaging, Studio and the
//! Marketplace add-on catalogue) behind a small gateway, and provides the batch
//! pipeline that validates a CSV of phone numbers and writes the results back.
//!
//! # Modules
//!
//! - `core`: Pipeline logic and shared models.
//! - `integrations`: External service integrations.
//! - `config`: Configuration management.
//! - `enrichment`: CSV import, per-row enrichment and export.
//! - `errors`: Error handling types.
//! - `gateway_client`: Twilio API client.
//! - `models`: Twilio response models and lookup outcomes.

pub mod core;
pub mod integrations;

// Re-export primary modules for shared use in tests and the binary
pub mod config;
pub mod enrichment;
pub mod errors;
pub mod gateway_client;
pub mod models;
