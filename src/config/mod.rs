pub mod cli;
pub mod settings;

pub use cli::{CliConfig, RunMode};
pub use settings::Settings;
