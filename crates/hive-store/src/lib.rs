//! # hive-store
//!
//! Durable per-session credential storage for Hive.
//!
//! Layout: `{root}/{session_id}/creds.bin`, one file per session, written
//! with write-then-rename so a crash mid-save leaves the previous state intact.

mod credentials;

#[cfg(test)]
mod tests;

pub use credentials::CredentialStore;
