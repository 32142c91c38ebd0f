#![forbid(unsafe_code)]
//! tally-core library.
//!
//! Reduces a multi-writer social action log into the set of accounts that
//! currently have an action (like, star, follow) active, overlays the
//! viewer's in-flight toggle on top of it, and builds the write payload
//! that records the toggle.
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for I/O-facing helpers and typed
//!   `thiserror` enums at library seams ([`store::StoreError`],
//!   [`action::parser::SnapshotError`]).
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod action;
pub mod chart;
pub mod command;
pub mod config;
pub mod error;
pub mod overlay;
pub mod reducer;
pub mod store;
pub mod subject;
pub mod widget;

pub use action::{AccountId, ActionEntry, ActionKind, ActionPair, Snapshot};
pub use command::{ToggleCommand, WritePayload};
pub use overlay::{IntentId, Overlay, PendingIntent, Resolution, WriteOutcome};
pub use reducer::{ActiveSet, Observation, reduce};
pub use subject::Subject;
pub use widget::{ClickOutcome, RenderState, ToggleWidget};
