//! # gatehouse-common
//!
//! Shared configuration, error handling, the token codec, and the route policy used
//! across all Gatehouse crates. Nothing in here knows about the HTTP router beyond
//! turning errors into responses.

pub mod config;
pub mod error;
pub mod identity;
pub mod policy;
pub mod token;
pub mod validation;
