//! Common types for Tandem
//!
//! This crate provides the identifier types shared by the matchmaking
//! engine, its storage adapters and the HTTP boundary.
//!
//! # Modules
//!
//! - [`types`] - Participant and match identifiers

pub mod types;

pub use types::*;
