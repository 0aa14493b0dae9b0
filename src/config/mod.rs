//! Engine configuration: TOML schema, loader, and errors.
//!
//! # Example
//!
//! ```no_run
//! use dashboard_layout::config::ConfigLoader;
//!
//! let config = ConfigLoader::load_default().expect("config loads");
//! assert!(config.store.channel_capacity > 0);
//! ```

mod error;
mod loader;
mod schema;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{EngineConfig, LogConfig, StoreConfig};
