//! services/api/src/lib.rs
//!
//! The HTTP service: configuration, adapters onto Postgres and the critique model,
//! and the axum web layer. The binaries only wire these together.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
