//! FastSpot ordering API library.
//!
//! The binary in `main.rs` wires configuration, tracing and Sentry around
//! [`routes::routes`]; everything else lives here so it can be driven from
//! integration tests with in-memory stores.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod gemini;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
