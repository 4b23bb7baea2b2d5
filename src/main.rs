use bounce_cleaner::adapters::oauth;
use bounce_cleaner::core::report;
use bounce_cleaner::utils::{logger, validation::Validate};
use bounce_cleaner::{
    Authenticator, BounceCleaner, BouncedEmailSet, CleanerError, ClientSecrets, CliConfig,
    LocalStorage, PeopleClient, Result, RunMode,
};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    // 初始化日誌
    if config.log_json {
        logger::init_json_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting bounce-cleaner");
    tracing::debug!("CLI config: {:?}", config);

    if let Err(e) = run(config).await {
        tracing::error!("❌ {} (exit code {})", e, e.exit_code());
        report_failure(&e);
        std::process::exit(e.exit_code());
    }

    Ok(())
}

async fn run(mut config: CliConfig) -> Result<()> {
    // 驗證配置
    config.load_settings()?;
    config.validate()?;

    report::print_banner();

    let bounced = BouncedEmailSet::load(&config.load_file)?;
    if let Some(path) = &config.save_normalized {
        bounced.save_sorted(path)?;
    }

    let secrets = ClientSecrets::from_file(&config.credentials)?;
    let authenticator = Authenticator::new(secrets, &config.token, &config.settings.auth);
    let access_token = authenticator.access_token().await?;
    tracing::info!("✅ Authenticated with Google");

    let api = PeopleClient::new(
        &config.settings.api.base_url,
        access_token,
        config.settings.retry_policy(),
        config.settings.request_timeout(),
    )?;
    let storage = LocalStorage::new(".");
    let mode = config.mode();
    let export_file = config.export_file.clone();
    let cleaner = BounceCleaner::new(api, storage, config, bounced);

    match mode {
        RunMode::Stats => {
            let stats = cleaner.stats().await?;
            report::print_stats(&stats);
        }
        RunMode::Export => {
            let scan = cleaner.export().await?;
            report::print_export(&scan, &export_file);
        }
        RunMode::Remove => {
            let outcome = cleaner.remove().await?;
            report::print_removal(&outcome);
            report::print_footer();
        }
    }

    Ok(())
}

fn report_failure(e: &CleanerError) {
    match e {
        CleanerError::MissingCredentialsError { path } => {
            eprintln!("\n❌ ERROR: {} not found!\n", path);
            eprintln!("{}", oauth::setup_instructions());
        }
        CleanerError::BouncedFileNotFound { path } => {
            eprintln!("\n⚠️  File {} not found", path);
            eprintln!(
                "\n📝 Please create a file '{}' with bounced emails (one per line)",
                path
            );
            eprintln!("Example content:");
            eprintln!("  baduser@example.com");
            eprintln!("  invalid@domain.com");
            eprintln!("  bounced@email.com");
        }
        _ => {
            eprintln!("❌ {}", e);
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
        }
    }
}
