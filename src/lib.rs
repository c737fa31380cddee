//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates. Host applications can depend on `playback-core-workspace`
//! and get the assembled [`PlaybackCore`](core_service::PlaybackCore) without
//! wiring each crate individually.

#[cfg(feature = "service")]
pub use core_service::{CoreError, PlaybackCore, PlaybackCoreBuilder};
