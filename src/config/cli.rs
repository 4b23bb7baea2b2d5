use crate::config::settings::Settings;
use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "bounce-cleaner")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Clean bounced emails from Google Contacts")]
#[command(after_help = "Examples:
  # Load bounced emails from file and do a dry run
  bounce-cleaner --load-file bounced_emails.txt

  # Actually delete the contacts
  bounce-cleaner --load-file bounced_emails.txt --no-dry-run

  # Export list of contacts to be deleted
  bounce-cleaner --load-file bounced_emails.txt --export")]
pub struct CliConfig {
    /// File containing bounced emails (one per line)
    #[arg(long, default_value = "bounced_emails.txt")]
    pub load_file: String,

    /// Actually delete contacts (default is dry run)
    #[arg(long)]
    pub no_dry_run: bool,

    /// Export list of contacts to be deleted to JSON
    #[arg(long)]
    pub export: bool,

    /// Where --export writes its JSON
    #[arg(long, default_value = "contacts_to_delete.json")]
    pub export_file: String,

    /// Show statistics only
    #[arg(long)]
    pub stats: bool,

    /// Path to Google OAuth credentials file
    #[arg(long, default_value = "credentials.json")]
    pub credentials: String,

    /// Path to token file for storing auth
    #[arg(long, default_value = "token.json")]
    pub token: String,

    /// Write the normalized, deduplicated bounced list to this path
    #[arg(long)]
    pub save_normalized: Option<String>,

    /// Optional TOML settings file (API endpoint, retry, batch size)
    #[arg(long, env = "BOUNCE_CLEANER_CONFIG")]
    pub config: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    #[arg(skip)]
    pub settings: Settings,
}

impl CliConfig {
    /// Loads the settings file named by `--config`, if any.
    pub fn load_settings(&mut self) -> Result<()> {
        if let Some(path) = &self.config {
            tracing::debug!("Loading settings from {}", path);
            self.settings = Settings::from_file(path)?;
        }
        Ok(())
    }

    pub fn mode(&self) -> RunMode {
        if self.stats {
            RunMode::Stats
        } else if self.export {
            RunMode::Export
        } else {
            RunMode::Remove
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Stats,
    Export,
    Remove,
}

impl ConfigProvider for CliConfig {
    fn export_file(&self) -> &str {
        &self.export_file
    }

    fn dry_run(&self) -> bool {
        !self.no_dry_run
    }

    fn page_size(&self) -> u32 {
        self.settings.api.page_size
    }

    fn delete_batch_size(&self) -> usize {
        self.settings.delete.batch_size
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("load_file", &self.load_file)?;
        validation::validate_path("credentials", &self.credentials)?;
        validation::validate_path("token", &self.token)?;
        validation::validate_path("export_file", &self.export_file)?;
        validation::validate_distinct_paths(
            ("token", self.token.as_str()),
            ("export_file", self.export_file.as_str()),
        )?;
        validation::validate_distinct_paths(
            ("credentials", self.credentials.as_str()),
            ("token", self.token.as_str()),
        )?;
        if let Some(path) = &self.save_normalized {
            validation::validate_path("save_normalized", path)?;
        }
        self.settings.validate()
    }
}
