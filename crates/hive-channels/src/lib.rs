//! # hive-channels
//!
//! Connection providers and QR artifact rendering for Hive.

pub mod qr;
pub mod whatsapp;
pub mod whatsapp_store;
