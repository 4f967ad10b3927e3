pub mod config;
pub mod duration;
pub mod error;
pub mod model;

pub use config::GeneratorConfig;
pub use duration::{format_duration, parse_duration};
pub use error::*;
pub use model::*;
