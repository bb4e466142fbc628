//! mjrun Tracking - experiment tracking session client
//!
//! Opens a session with a W&B-compatible tracking service and forwards the
//! resolved run configuration to it.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod session;

pub use client::{TrackingClient, DEFAULT_BASE_URL};
pub use session::{generate_run_id, InitRequest, TrackingError, TrackingSession};
