//! Bazaar Storefront library.
//!
//! Cart, coupon and order API for the storefront. The binary in `main.rs`
//! wires configuration, tracing and Sentry around [`routes::app`]; the CLI
//! and integration tests use the repositories and services directly.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
