//! Customer onboarding tracker.
//!
//! A phased task catalog shared by every customer, a per-customer progress
//! ledger with staff verification, comment threads, and reports unlocked by
//! task completion. Exposed as an HTTP JSON API and a small operator CLI.

pub mod access;
pub mod aggregate;
pub mod blob;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod export;
pub mod format;
pub mod logging;
pub mod service;
pub mod types;
