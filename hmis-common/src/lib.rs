//! # HMIS Common Library
//!
//! Shared code for the HMI SHARP staging tools:
//! - Error and result types
//! - Configuration loading and resolution
//! - Calendar helpers for month-scoped staging

pub mod config;
pub mod error;
pub mod time;

pub use config::StagerConfig;
pub use error::{Error, Result};
