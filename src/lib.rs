//! CSM Survey API Library
//!
//! Client Satisfaction Measurement survey service: the public submission
//! pipeline (form, answer encoding, validation, persistence) and the admin
//! dashboard (authentication, filtering, satisfaction statistics).
//!
//! # Modules
//!
//! - `api`: HTTP handlers, routes and the admin guard.
//! - `core`: Survey domain logic.
//! - `data`: Data access layer.
//! - `integrations`: External service integrations.
//! - `obs`: Observability and logging.
//! - `auth`: Admin session and role checks.
//! - `auth_client`: Auth server client.
//! - `catalog`: Code sets, regions and services offered to the form.
//! - `circuit_breaker`: Circuit breaker for the database.
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `db_storage`: Postgres response store.
//! - `encoding`: Form codes to domain values.
//! - `errors`: Error handling types.
//! - `filters`: Admin dashboard filters.
//! - `form`: Form state machine.
//! - `handlers`: HTTP request handlers.
//! - `models`: Core data models.
//! - `routes`: Router assembly.
//! - `stats`: Satisfaction statistics.
//! - `store`: Store trait and the local backend.
//! - `validation`: Submission constraints.

pub mod api;
pub mod core;
pub mod data;
pub mod integrations;
pub mod obs;

// Re-export primary modules for shared use in tests and the binary
pub mod auth;
pub mod auth_client;
pub mod catalog;
pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod encoding;
pub mod errors;
pub mod filters;
pub mod form;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod stats;
pub mod store;
pub mod validation;
