//! licgate administrator tool
//!
//! Approves activation requests and manages the license store on the
//! machine being activated. This binary is never shipped to end users.
//!
//! Usage:
//!   licgate-admin keygen --out signing.key
//!   licgate-admin approve --key signing.key
//!   licgate-admin approve --key signing.key --email user@shopee.com --fingerprint <fp> --emit
//!   licgate-admin install --token-file token.lic

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use licgate_issuer::{
    IssueError, Issuer, encode_verifying_key, generate_signing_key, install_encoded, local_status,
    read_signing_key, write_signing_key,
};
use licgate_license::{
    DeviceFingerprint, HostFingerprint, LicenseConfig, LicenseGate, LicenseStore, LicenseToken,
    SystemClock, validate_token,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "licgate-admin")]
#[command(about = "licgate license approval and store management")]
struct Args {
    /// Path to a JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// License store directory (overrides the per-user default)
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new signing key and print its verifying key
    Keygen {
        /// Where to write the signing key
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Approve the pending request on this machine, or an explicit email/fingerprint
    Approve {
        /// Signing key file
        #[arg(short, long)]
        key: PathBuf,
        /// Email to license (defaults to the pending request)
        #[arg(long)]
        email: Option<String>,
        /// Device fingerprint to bind with --email (defaults to this machine)
        #[arg(long, requires = "email")]
        fingerprint: Option<String>,
        /// Print the token instead of writing it to the store
        #[arg(long)]
        emit: bool,
    },
    /// Verify a relayed token and write it to the store
    Install {
        /// File containing the encoded token
        #[arg(short, long)]
        token_file: PathBuf,
    },
    /// Show the stored token and whether it is valid on this machine
    Inspect,
    /// Delete the stored token
    Revoke,
    /// Check the stored license once and report the state
    Status,
    /// Request activation for an email, as the host UI would
    Request {
        /// Corporate email address
        #[arg(long)]
        email: String,
    },
    /// Print this machine's device fingerprint
    Fingerprint,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let mut config = match &args.config {
        Some(path) => LicenseConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => LicenseConfig::default(),
    };
    if let Some(dir) = &args.store_dir {
        config.store_dir = Some(dir.clone());
    }
    let store = match &config.store_dir {
        Some(dir) => LicenseStore::at(dir),
        None => LicenseStore::open_default(&config.app_name)?,
    };

    match args.command {
        Command::Keygen { out } => {
            let key = generate_signing_key();
            write_signing_key(&out, &key)?;
            info!("Signing key written to {}", out.display());
            println!("{}", encode_verifying_key(&key.verifying_key()));
        }
        Command::Approve {
            key,
            email,
            fingerprint,
            emit,
        } => {
            let signing_key = read_signing_key(&key).context("failed to read signing key")?;
            let issuer = Issuer::new(signing_key, config.domain_policy()?);

            let token = match email {
                Some(email) => {
                    let fp = fingerprint
                        .map(DeviceFingerprint::from_id)
                        .unwrap_or_else(DeviceFingerprint::generate);
                    if emit {
                        issuer.issue(&email, &fp)?
                    } else {
                        issuer.issue_and_store(&email, &fp, &store)?
                    }
                }
                None => {
                    let request = store
                        .load_pending()?
                        .ok_or(IssueError::NoPendingRequest)
                        .with_context(|| {
                            format!("nothing to approve in {}", store.dir().display())
                        })?;
                    info!(
                        "Approving request {} for {} ({})",
                        request.request_id, request.email, request.fingerprint
                    );
                    if emit {
                        issuer.approve(&request)?
                    } else {
                        issuer.approve_and_store(&request, &store)?
                    }
                }
            };

            if emit {
                println!("{}", token.encode()?);
            } else {
                println!(
                    "License issued to {} until {}",
                    token.subject_email(),
                    token.expires_at().to_rfc3339()
                );
            }
        }
        Command::Install { token_file } => {
            let encoded = std::fs::read_to_string(&token_file)
                .with_context(|| format!("failed to read {}", token_file.display()))?;
            let token = install_encoded(encoded.trim(), &config.verifying_key()?, &store)?;
            println!(
                "License for {} installed, valid until {}",
                token.subject_email(),
                token.expires_at().to_rfc3339()
            );
        }
        Command::Inspect => {
            let Some(bytes) = store.load()? else {
                println!("No license present in {}", store.dir().display());
                return Ok(());
            };
            let key = config.verifying_key()?;
            let token = LicenseToken::decode_with_key(&bytes, &key)
                .context("stored token does not verify")?;
            println!("Email:       {}", token.subject_email());
            println!("Fingerprint: {}", token.device_fingerprint());
            println!("Issued:      {}", token.issued_at().to_rfc3339());
            println!("Expires:     {}", token.expires_at().to_rfc3339());
            let verdict = validate_token(
                &bytes,
                &key,
                &config.domain_policy()?,
                &DeviceFingerprint::generate(),
                chrono::Utc::now(),
            );
            match verdict {
                Ok(_) => println!("Status:      valid on this machine"),
                Err(e) => println!("Status:      rejected ({e})"),
            }
        }
        Command::Revoke => {
            store.remove()?;
            println!("License removed from {}", store.dir().display());
        }
        Command::Status => {
            let state = local_status(
                store,
                config.verifying_key()?,
                config.domain_policy()?,
                config.store_timeout(),
                Arc::new(HostFingerprint),
                Arc::new(SystemClock),
            )
            .await;
            println!("{}", if state.is_unlocked() { "licensed" } else { "not licensed" });
        }
        Command::Request { email } => {
            let gate = LicenseGate::start(config).await?;
            let outcome = gate.request_activation(&email).await;
            println!("{}", outcome.user_message());
            gate.shutdown().await;
        }
        Command::Fingerprint => {
            println!("{}", DeviceFingerprint::generate());
        }
    }

    Ok(())
}
