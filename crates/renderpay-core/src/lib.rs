//! Core types for renderpay.
//!
//! This crate provides the foundational types used throughout the renderpay
//! platform:
//!
//! - **Identifiers**: `AccountId`, `JobId`, `EntryId`
//! - **Accounts**: `Account` (cash balance + promotional free generations)
//! - **Jobs**: `Job`, `JobStatus`, `JobType`, `JobInput`
//! - **Ledger**: `LedgerEntry`, `EntryType`
//! - **Catalog**: `ModelCatalog`, `ModelSpec`, parameter validation and pricing
//!
//! # Credit Unit
//!
//! **1 credit = 1 cent** of the single supported currency.
//!
//! - User tops up $10 → gets 1000 credits
//! - A video render priced at 30 credits deducts 30
//! - Stored as `i64` (integer cents) to avoid floating point precision issues
//!
//! Promotional credits (`promo_credits`) are counted in whole free
//! generations, not cents: one promo credit waives the unit cost of one
//! generated output.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod catalog;
pub mod error;
pub mod ids;
pub mod job;
pub mod ledger;

pub use account::Account;
pub use catalog::{
    CatalogError, InputRule, ModelCatalog, ModelSpec, ParamSpec, ParamValue, PriceRule,
    ValidatedRequest,
};
pub use error::{LedgerError, Result};
pub use ids::{AccountId, EntryId, IdError, JobId};
pub use job::{Job, JobInput, JobStatus, JobType};
pub use ledger::{EntryType, LedgerEntry};
