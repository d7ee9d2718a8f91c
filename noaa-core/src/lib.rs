//! Core library for the `noaa-etl` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling (`.env`, settings file, overrides)
//! - A client for the NOAA Climate Data Online v2 API
//! - An object store uploader for raw JSON payloads
//! - The probe → fetch → upload pipeline
//!
//! It is used by `noaa-cli`, but can also be reused by other binaries or services.

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod store;

#[cfg(test)]
mod test_support;

pub use client::{CdoClient, ObservationSource};
pub use config::{ApiSettings, ApiToken, Config, Overrides, Settings, StoreSettings};
pub use error::{ConfigError, FetchError, StoreSetupError, UploadError};
pub use model::{DataQuery, StorageKey};
pub use pipeline::{Pipeline, RunOptions, RunOutcome, RunReport, Stage};
pub use store::{ObjectUploader, UploadReceipt};
