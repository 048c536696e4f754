pub mod analyzers;
pub mod config;
pub mod error;
pub mod loader;
pub mod output;
pub mod resolve;

pub use config::{ConcentrationMap, StudyConfig};
pub use error::{Result, StudyError};
pub use loader::Dataset;
