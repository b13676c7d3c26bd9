use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

mod config;
mod credentials;
mod mc;
mod policy;
mod provision;
mod report;

use credentials::CredentialProfile;
use mc::McProcessClient;
use provision::{ProvisionError, Provisioner, ProvisioningOutcome, ProvisioningRequest};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Provision a bucket with a scoped admin, policy, and service account
    #[command(visible_alias = "c")]
    Create {
        /// Name of the bucket to provision (lowercase DNS label, 3-63 chars)
        bucket: String,
        /// S3 endpoint URL reported with the credentials
        #[arg(long, default_value = config::DEFAULT_ENDPOINT)]
        endpoint: Url,
        /// Pre-configured mc alias every operation runs against
        #[arg(long, default_value = config::DEFAULT_ALIAS)]
        alias: String,
        /// Path to the mc binary
        #[arg(long, default_value = config::DEFAULT_MC_BINARY)]
        mc_bin: String,
        /// Per-operation timeout in seconds
        #[arg(long, default_value_t = config::DEFAULT_STEP_TIMEOUT_SECS)]
        timeout: u64,
    },
    /// Print the least-privilege policy document for a bucket
    #[command(visible_alias = "p")]
    Policy {
        /// Bucket name the policy is scoped to
        bucket: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Create {
            bucket,
            endpoint,
            alias,
            mc_bin,
            timeout,
        } => {
            let request = ProvisioningRequest::new(&bucket, endpoint)?;
            let client = McProcessClient::new(mc_bin, alias, Duration::from_secs(timeout));
            let provisioner = Provisioner::new(
                client,
                CredentialProfile::default(),
                config::NamingConfig::default(),
            );

            match provisioner.provision(&request).await {
                Ok(outcome) => {
                    report::print_outcome(&outcome);
                    Ok(match outcome {
                        ProvisioningOutcome::Created(_) => ExitCode::SUCCESS,
                        // Distinct code so scripts can tell a name conflict
                        // from a hard failure.
                        ProvisioningOutcome::AlreadyExists { .. } => ExitCode::from(2),
                    })
                }
                Err(err) => {
                    if let ProvisionError::Failed { partial, .. } = &err {
                        report::print_partial(partial);
                    }
                    Err(err).context("Provisioning did not complete")
                }
            }
        }
        Commands::Policy { bucket } => {
            provision::validate_bucket_name(&bucket)
                .map_err(|reason| anyhow::anyhow!("invalid bucket name '{}': {}", bucket, reason))?;
            let document = policy::bucket_policy(&bucket);
            println!("{}", document.to_json()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
