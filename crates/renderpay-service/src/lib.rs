//! Renderpay HTTP API service.
//!
//! This crate hosts the job saga orchestrator behind an HTTP API:
//!
//! - Account registration and balance lookup
//! - Metered generation requests (`POST /v1/generate`)
//! - Ledger history and admin top-ups
//!
//! # Authentication
//!
//! Requests arrive from a trusted gateway (the bot frontend) that has
//! already verified the end user's messaging-platform identity. The gateway
//! authenticates with a service API key and forwards the stable external id;
//! privileged endpoints use a separate admin key.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Some handlers are async only for routing consistency

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod saga;
pub mod stager;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use saga::{run_job, SagaReport};
pub use stager::{BlobStager, DirectStager, HttpStager, StageError};
pub use state::AppState;
