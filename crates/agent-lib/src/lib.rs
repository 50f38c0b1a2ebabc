//! Agent library for the RiftSync match tracker
//!
//! This crate provides the core functionality for:
//! - Local game-client discovery and event streaming
//! - Match reconstruction from end-of-game telemetry
//! - Credential management for the remote backend
//! - The resilient sync pipeline

pub mod auth;
pub mod backend;
pub mod client;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod reconstruct;

pub use auth::{CredentialManager, CredentialPair, CredentialStore, UserIdentity};
pub use backend::BackendClient;
pub use error::SyncError;
pub use models::*;
pub use pipeline::{SyncOutcome, SyncPipeline};
