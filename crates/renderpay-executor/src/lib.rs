//! Generation executor adapter for renderpay.
//!
//! This crate wraps the outbound call to the external generation backend.
//! The envelope is serialized once, an HMAC-SHA256 signature over those
//! exact bytes is attached as a header, and the call is bounded by a
//! configurable timeout. Every failure mode maps to a structured
//! [`ExecutorError`] with a stable code so the saga can settle and refund
//! deterministically.
//!
//! The adapter performs exactly one invocation per job and never retries:
//! the remote side may already be mid-render (and billed by a third party),
//! so a timed-out or failed call is a terminal failure for the job.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod envelope;
pub mod error;
pub mod sign;

pub use client::ExecutorClient;
pub use envelope::{ExecutorSuccess, JobEnvelope, StagedInput};
pub use error::ExecutorError;
pub use sign::hmac_sha256_hex;

/// Name of the signature header attached to every executor request.
pub const SIGNATURE_HEADER: &str = "x-signature";
