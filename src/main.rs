//! CLI entry point for azure-api-client.
//!
//! Probes the instance metadata service, prints bearer tokens, and resolves
//! marketplace purchase tokens. Authentication is chosen the same way the
//! library's `AuthenticatorFactory` chooses it: client credentials when
//! `AZURE_TENANT_ID`, `AZURE_CLIENT_ID` and `AZURE_CLIENT_SECRET` are set,
//! managed identity otherwise.
//!
//! Exit codes:
//! - 0: success
//! - 1: runtime error (service unavailable, auth failure, mapping error)
//! - 2: argument validation error (clap handles this automatically)

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use azure_api_client::auth::{Authenticator, AuthenticatorFactory};
use azure_api_client::config::ClientOptions;
use azure_api_client::error::Result;
use azure_api_client::marketplace::MarketplaceClient;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Retries after the first attempt for each HTTP request.
    #[arg(long, env = "AZURE_API_CLIENT_MAX_RETRIES", default_value_t = 5)]
    max_retries: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that the instance metadata service answers.
    Check,

    /// Print a bearer token for a resource.
    Token {
        /// Resource URI the token is for (e.g. https://vault.azure.net).
        #[arg(long)]
        resource: String,
    },

    /// Resolve a marketplace purchase token and print the subscription.
    Resolve {
        /// The `token` query parameter from the landing page URL.
        #[arg(long, env = "MARKETPLACE_TOKEN")]
        marketplace_token: String,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let options = ClientOptions::default().with_max_retries(cli.max_retries);

    match cli.command {
        Command::Check => {
            AuthenticatorFactory::new(options)
                .managed_identity()?
                .check_usability()
                .await?;
            println!("Instance metadata service is available");
        }
        Command::Token { resource } => {
            let auth = AuthenticatorFactory::new(options).create().await?;
            let token = auth.get_authentication_token(&resource).await?;
            eprintln!("Token expires at {}", token.expiration.to_rfc3339());
            println!("{}", token.access_token);
        }
        Command::Resolve { marketplace_token } => {
            let auth = AuthenticatorFactory::new(options.clone()).create().await?;
            let client = MarketplaceClient::new(auth, options)?;
            let result = client.resolve_subscription(&marketplace_token).await?;
            println!(
                "Subscription {} ({}) offer={} plan={} status={}",
                result.id,
                result.subscription_name,
                result.offer_id,
                result.plan_id,
                result.subscription.saas_subscription_status
            );
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
