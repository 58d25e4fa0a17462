//! Roster CLI - Command-line interface
//!
//! Usage:
//!   roster serve
//!   roster init-db
//!   roster create-admin --name <NAME> --email <EMAIL> --password <PASSWORD> [--if-empty]
//!   roster issue-token --user-id <ID>

use anyhow::Context;
use clap::{Parser, Subcommand};
use roster_api::models::{CreateUserRequest, UserResponse};
use roster_api::service::bootstrap_admin;
use roster_api::state::AppState;
use roster_core::{AppConfig, Role, SqlUserRepository};
use std::path::PathBuf;
use validator::Validate;

#[derive(Parser)]
#[command(name = "roster")]
#[command(about = "User management service CLI")]
#[command(version)]
struct Cli {
    /// TOML configuration file; environment variables still override it
    #[arg(long, global = true, env = "ROSTER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server
    Serve,
    /// Create the database schema if it does not exist
    InitDb,
    /// Create an administrator account
    CreateAdmin {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value_t = 0)]
        age: i32,
        /// Only create the account when the store holds no users yet
        #[arg(long)]
        if_empty: bool,
    },
    /// Print a fresh access token for an existing user
    IssueToken {
        #[arg(long)]
        user_id: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    roster_api::init_tracing(&config.logging)?;

    match cli.command {
        Commands::Serve => roster_api::serve(config).await?,
        Commands::InitDb => {
            let store = SqlUserRepository::connect(&config.database).await?;
            store.init_schema().await?;
            println!("Schema ready at {}", config.database.url);
        }
        Commands::CreateAdmin {
            name,
            email,
            password,
            age,
            if_empty,
        } => {
            let request = CreateUserRequest {
                name,
                email,
                password,
                age,
                role: Some(Role::Admin),
            };
            request.validate().context("invalid admin account")?;

            let state = AppState::connect(config).await?;
            let user = if if_empty {
                let created =
                    bootstrap_admin(state.repository.as_ref(), state.users.as_ref(), request)
                        .await?;
                match created {
                    Some(user) => user,
                    None => {
                        println!("Users already exist; no admin created");
                        return Ok(());
                    }
                }
            } else {
                state.users.create_user(request).await?
            };
            tracing::info!(user_id = user.id, "Admin account created");
            println!("{}", serde_json::to_string_pretty(&UserResponse::from(user))?);
        }
        Commands::IssueToken { user_id } => {
            let state = AppState::connect(config).await?;
            let user = state.users.get_user_by_id(user_id).await?;
            let token = state
                .tokens
                .issue_access_token(user.id, &user.email, &user.name, user.role)?;
            println!("{token}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create_admin() {
        let cli = Cli::try_parse_from([
            "roster",
            "create-admin",
            "--name",
            "Root",
            "--email",
            "root@example.com",
            "--password",
            "secret1",
        ])
        .unwrap();

        match cli.command {
            Commands::CreateAdmin {
                name,
                age,
                if_empty,
                ..
            } => {
                assert_eq!(name, "Root");
                assert_eq!(age, 0);
                assert!(!if_empty);
            }
            _ => panic!("expected create-admin"),
        }
    }

    #[test]
    fn test_parse_create_admin_if_empty() {
        let cli = Cli::try_parse_from([
            "roster",
            "create-admin",
            "--name",
            "Root",
            "--email",
            "root@example.com",
            "--password",
            "secret1",
            "--if-empty",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::CreateAdmin { if_empty: true, .. }
        ));
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from([
            "roster",
            "issue-token",
            "--user-id",
            "7",
            "--config",
            "roster.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("roster.toml")));
        assert!(matches!(cli.command, Commands::IssueToken { user_id: 7 }));
    }
}
