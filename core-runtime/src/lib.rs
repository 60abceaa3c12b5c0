//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the playlist core:
//! - Logging and tracing infrastructure
//! - Configuration management and bridge wiring
//! - Event bus for cache state, download progress and load outcomes
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the acquisition subsystem
//! and the service façade depend on. It establishes the logging conventions
//! and event broadcasting mechanisms used throughout the system.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
