//! Inkpass Client SDK.
//!
//! This crate provides a client library for front ends and platform services to talk
//! to the inkpass entitlement service, plus [`EntitlementCache`] for readers.
//!
//! # Example
//!
//! ```no_run
//! use inkpass_client::{ClientOptions, InkpassClient};
//!
//! # async fn example() -> Result<(), inkpass_client::ClientError> {
//! let client = InkpassClient::with_options(
//!     "http://inkpass.platform.svc:8080",
//!     "your-service-api-key",
//!     ClientOptions::with_service_name("reader"),
//! )?;
//!
//! let access = client
//!     .check_chapter_access("6f1c3a52-6f0e-4a53-9d55-6a9b8a1c2e11", "ch-42")
//!     .await?;
//!
//! if !access.unlocked {
//!     println!("Chapter {} is locked", access.chapter_id);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod cache;
mod client;
mod error;
mod types;

pub use cache::{EntitlementCache, DEFAULT_SNAPSHOT_TTL_SECONDS};
pub use client::{ClientOptions, InkpassClient};
pub use error::ClientError;
pub use types::*;
