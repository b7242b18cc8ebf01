use anyhow::Result;
use clap::Parser;
use gmail_autoresponder::auth::{self, CredentialSource};
use gmail_autoresponder::cli::{Cli, Commands};
use gmail_autoresponder::client::{GmailClient, ProductionGmailClient};
use gmail_autoresponder::config::Config;
use gmail_autoresponder::error::GmailError;
use gmail_autoresponder::scheduler::{Pipeline, Scheduler};
use std::future::Future;
use std::process;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Exit with proper code on error
    if let Err(e) = run().await {
        display_error(&e);
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Install default crypto provider for rustls
    // On non-Windows platforms, use aws-lc-rs (better performance, FIPS support)
    // On Windows, use ring (better compatibility, no NASM/CMake required)
    #[cfg(not(windows))]
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    #[cfg(windows)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Initialize tracing with level based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("gmail_autoresponder=debug,info"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("gmail_autoresponder=info,warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    // Covers the consent flow and single passes as well as the scheduler
    spawn_interrupt_handler(tokio::signal::ctrl_c(), || {
        process::exit(0);
    });

    let mut config = Config::load(&cli.config).await?;
    cli.apply_overrides(&mut config);
    let command = cli.command();

    if let Commands::Auth { force } = command {
        if force && config.paths.token.exists() {
            tokio::fs::remove_file(&config.paths.token).await?;
            tracing::info!("Removed saved token {:?}", config.paths.token);
        }
    } else {
        // Fail fast before any browser window opens
        config.validate()?;
    }

    let authorization = auth::authorize(&config.paths.credentials, &config.paths.token).await?;
    match authorization.source {
        CredentialSource::Saved => tracing::info!("Using saved credentials"),
        CredentialSource::Consent => tracing::info!("Authorized through consent flow"),
    }
    let client = Arc::new(ProductionGmailClient::new(auth::build_hub(
        authorization.authenticator,
    )?));

    match command {
        Commands::Auth { .. } => {
            let email = client.account_email().await?;
            println!("Successfully authenticated with Gmail API");
            println!("Token saved at: {:?}", config.paths.token);
            println!("Connected to account: {}", email);
            Ok(())
        }

        Commands::Once => {
            let pipeline = Pipeline::from_config(client as Arc<dyn GmailClient>, &config);
            let report = pipeline.run_pass().await;
            println!(
                "Pass {}: {} candidates, {} replied, {} skipped, {} failed",
                report.pass_id, report.candidates, report.replied, report.skipped, report.failed
            );
            Ok(())
        }

        Commands::Run => {
            let pipeline = Arc::new(Pipeline::from_config(
                client as Arc<dyn GmailClient>,
                &config,
            ));
            let scheduler = Scheduler::new(pipeline, &config.schedule);

            // The interrupt handler ends the process
            scheduler.run_until(std::future::pending()).await;
            Ok(())
        }
    }
}

/// Run `on_interrupt` once `interrupt` resolves
///
/// In-flight work is abandoned; a reply may be left labeled but unsent.
fn spawn_interrupt_handler<F, E>(interrupt: F, on_interrupt: E) -> JoinHandle<()>
where
    F: Future<Output = std::io::Result<()>> + Send + 'static,
    E: FnOnce() + Send + 'static,
{
    tokio::spawn(async move {
        match interrupt.await {
            Ok(()) => {
                tracing::info!("Closing...");
                on_interrupt();
            }
            Err(e) => tracing::error!("Failed to listen for SIGINT: {}", e),
        }
    })
}

/// Display error with context
fn display_error(error: &anyhow::Error) {
    eprintln!("Error: {}", error);

    // Display error chain
    let mut cause = error.source();
    while let Some(e) = cause {
        eprintln!("  Caused by: {}", e);
        cause = e.source();
    }

    // Display helpful hints based on error type
    if let Some(gmail_err) = error.downcast_ref::<GmailError>() {
        match gmail_err {
            GmailError::AuthError(_) => {
                eprintln!("\nHint: Make sure your credentials.json file is valid.");
                eprintln!("      Try running: gmail-autoresponder auth --force");
            }
            GmailError::ConfigError(_) => {
                eprintln!("\nHint: Set LABEL_TO_WATCH (environment or .env) and check");
                eprintln!("      autoresponder.toml and credentials.json.");
            }
            _ => {}
        }
    }
}
