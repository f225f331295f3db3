pub mod types;
pub mod config;
pub mod error;
pub mod scoring;

pub use types::*;
pub use config::{
    day_window, max_window, window_start, EngineConfig, MAX_WINDOW_DAYS,
};
pub use error::{MatchError, ValidationError};
pub use scoring::*;
