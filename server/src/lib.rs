//! # Product Reviews Server
//!
//! The HTTP edge of the review service and the operator binaries around it.
//!
//! - [`api`]: handlers, validation and response shapes
//! - [`app`]: review, translation and media services over a [`app::Deps`] bundle
//! - [`clients`]: translation provider, CDN and blob storage clients
//! - [`server`]: router, state and probes
//! - [`bootstrap`]: connecting to Postgres and building the bundle
//! - [`config`]: environment-driven configuration
//!
//! Binaries: `server`, `worker`, `backfill`, `invalidate`, `translate`, `dlq`.

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod app;
pub mod bootstrap;
pub mod clients;
pub mod config;
pub mod server;

pub use config::Config;
pub use server::{AppState, build_router};
