//! # Floor Predictor Common Library
//!
//! Shared code for the floor predictor services:
//! - Error types
//! - TOML bootstrap configuration
//! - Logging initialisation

pub mod config;
pub mod error;
pub mod logging;

pub use config::Config;
pub use error::{Error, Result};
