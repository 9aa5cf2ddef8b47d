use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use clinic_companion_lib::config::{ClientConfig, APP_NAME, APP_VERSION};
use clinic_companion_lib::error::ClientError;
use clinic_companion_lib::otp::OtpStep;

#[derive(Parser)]
#[command(name = "clinic-companion")]
#[command(version, about = "Patient companion client for the clinic backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh profiles and load the first page of every list (default)
    Sync,
    /// Log in with a one-time password sent to a mobile number
    Login {
        /// Ten-digit mobile number
        #[arg(long)]
        mobile: String,
    },
    /// List linked patient profiles
    Profiles,
    /// Make a linked profile the active one
    UseProfile {
        /// Profile id as listed by `profiles`
        id: String,
    },
    /// Clear stored credentials and profiles
    Logout,
    /// Write per-route index.html copies with route metadata
    Prerender {
        /// Base index.html of the web build
        #[arg(long)]
        template: PathBuf,
        /// JSON route manifest
        #[arg(long)]
        routes: PathBuf,
        /// Output directory
        #[arg(long)]
        out: PathBuf,
    },
}

async fn read_code() -> Result<String, ClientError> {
    println!("Enter the code sent to your phone:");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .map_err(|e| ClientError::InvalidInput(format!("could not read code: {e}")))?;
    Ok(line.trim().to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    clinic_companion_lib::init_tracing();
    let cli = Cli::parse();
    let config = ClientConfig::from_env();
    tracing::info!("{APP_NAME} v{APP_VERSION} ({})", config.api_base_url);

    match cli.command.unwrap_or(Commands::Sync) {
        Commands::Prerender { template, routes, out } => {
            let count = clinic_companion_lib::prerender(&template, &routes, &out)?;
            println!("Wrote {count} route pages to {}", out.display());
        }
        Commands::Sync => {
            let (session, client) = clinic_companion_lib::connect(&config)?;
            match clinic_companion_lib::sync(&session, &client, config.page_size).await {
                Ok(report) => match report.profile {
                    Some(profile) => println!(
                        "Profile {profile}: {} appointments, {} bills, {} prescriptions",
                        report.appointments, report.bills, report.prescriptions
                    ),
                    None => println!("No patient profile is linked to this account."),
                },
                Err(e) if e.requires_login() => {
                    println!("Not logged in. Run `clinic-companion login --mobile <number>`.");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Login { mobile } => {
            let (session, client) = clinic_companion_lib::connect(&config)?;
            match clinic_companion_lib::login(&client, &mobile, read_code).await? {
                OtpStep::Verified(user) => {
                    let name = user.and_then(|u| u.name).unwrap_or_else(|| mobile.clone());
                    println!("Logged in as {name}.");
                    let report = clinic_companion_lib::sync(&session, &client, config.page_size).await?;
                    println!("{} linked profile(s).", report.profiles);
                }
                OtpStep::Entering(n) => {
                    println!("The code must have 4 digits (got {n}).");
                }
            }
        }
        Commands::Profiles => {
            let (session, _client) = clinic_companion_lib::connect(&config)?;
            let active = session.active_profile()?.map(|p| p.id);
            for profile in session.profiles()? {
                let marker = if Some(&profile.id) == active.as_ref() { "*" } else { " " };
                println!(
                    "{marker} {}  {}  {}",
                    profile.id,
                    profile.name,
                    profile.clinic_name.as_deref().unwrap_or("-")
                );
            }
        }
        Commands::UseProfile { id } => {
            let (session, _client) = clinic_companion_lib::connect(&config)?;
            clinic_companion_lib::use_profile(&session, &id)?;
            println!("Active profile: {id}");
        }
        Commands::Logout => {
            let (_session, client) = clinic_companion_lib::connect(&config)?;
            client.logout()?;
            println!("Logged out.");
        }
    }
    Ok(())
}
