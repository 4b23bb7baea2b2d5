pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{Authenticator, ClientSecrets, LocalStorage, PeopleClient, StoredToken};
pub use config::{CliConfig, RunMode, Settings};
pub use crate::core::{cleaner::BounceCleaner, BouncedEmailSet};
pub use utils::error::{CleanerError, Result};
