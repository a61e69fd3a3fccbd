pub mod config;
pub mod error;
pub mod models;

pub use config::{ConfigOverrides, RunnerConfig};
pub use error::{RelockError, Result};
pub use models::*;
