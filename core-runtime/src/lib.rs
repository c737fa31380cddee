//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the playback core:
//! - Logging and tracing infrastructure
//! - Configuration management and preference loading
//!
//! ## Overview
//!
//! Every other core crate depends on this one for its logging conventions and
//! for the validated [`CoreConfig`](config::CoreConfig) it is built from.

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
