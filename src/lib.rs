//! # Bazaar Data
//!
//! Data layer of the Bazaar classifieds admin: record shapes for the
//! application's collections, plus the one-shot operator scripts that prepare
//! a hosted Postgres backend for them.
//!
//! ## Core Components
//!
//! - **Models**: validated record shapes with defaults and index hints
//! - **Documents**: a JSON document store over SQLite that enforces them
//! - **Backend**: PostgREST-style remote client, with a local SQLite stand-in
//! - **Migrate**: add-column-and-index runner with a probe fallback
//! - **Seed**: reference-data loader gated on empty tables
//! - **JWT**: payload decoder for inspecting API keys
//! - **Connection**: process-wide readiness handle

pub mod backend;
pub mod config;
pub mod connection;
pub mod db;
pub mod documents;
pub mod error;
pub mod guard;
pub mod inference;
pub mod jwt;
pub mod migrate;
pub mod models;
pub mod seed;

pub use error::{BazaarError, BazaarResult};
