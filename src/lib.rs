//! Matchbridge is an allow-list filtering bridge between Kafka clusters.
//!
//! Each configured route reads "reference" topics on the bridge cluster
//! to build a cache of allowed values, and forwards messages from its
//! source topics to a destination topic only when some value in the
//! payload is in that cache.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, validate, health).
//! - [`config`] -- Configuration model, file loading, and validation.
//! - [`engine`] -- Field extraction, year-prefix variants, and the per-route
//!   [`Matcher`](engine::Matcher).
//! - [`store`] -- The shared [`MatchStore`](store::MatchStore) and its JSON
//!   snapshot persistence.
//! - [`transport`] -- The broker boundary: Kafka via librdkafka and an
//!   in-process broker for tests.
//! - [`bridge`] -- Route orchestration: reference collectors, source
//!   streamers, and the destination writer pool.
//! - [`admin`] -- Cache injection, inspection, and reset endpoints.
//! - [`health`] -- `GET /health` endpoint handler returning runtime diagnostics.
//! - [`server`] -- Axum admin server setup, shared state, and graceful shutdown.
//! - [`error`] -- Unified error types using `thiserror`.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `yaml` | YAML config file support _(enabled by default)_ |
//! | `json` | JSON config file support |
//! | `toml` | TOML config file support |
//! | `kafka` | Kafka transport via `rdkafka` _(enabled by default)_ |
//! | `sentry-integration` | Sentry error tracking |
//! | `file-backends` | All file format backends |
//! | `full` | All features |

// Binary crate: public functions are internal.
#![allow(clippy::missing_errors_doc)]

pub mod admin;
pub mod bridge;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod engine;
pub mod error;
pub mod health;
pub mod logging;
pub mod server;
pub mod store;
pub mod transport;

#[cfg(feature = "sentry-integration")]
pub mod sentry_integration;
