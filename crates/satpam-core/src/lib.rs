//! Core types and trait definitions for the satpam session authority.
//!
//! This crate is deliberately free of HTTP and storage dependencies.
//! All other crates depend on it; the only async machinery it pulls in is
//! `tokio::sync` for the channel types named in trait signatures.

pub mod backend;
pub mod error;
pub mod event;
pub mod profile;
pub mod session;

pub use error::{CredentialError, ProfileError};
