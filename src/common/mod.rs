//! # Common Components
//!
//! Ambient pieces shared by the core modules and the front ends.
//!
//! ## Modules
//!
//! - [`config`]: TOML configuration loading and defaults
//! - [`error`]: the [`StegoError`](error::StegoError) taxonomy
//! - [`logging`]: `env_logger` setup used by the binaries

pub mod config;
pub mod error;
pub mod logging;
