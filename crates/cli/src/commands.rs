//! CLI commands

use anyhow::{Result, bail};
use clap::Subcommand;
use scheduler_client::config::{CONFIG_FILE, default_data_dir};
use scheduler_client::types::RegisterRequest;
use scheduler_client::{
    ClientConfig, FileStorage, History, LogoutOutcome, RefreshOutcome, SessionManager,
    SessionStore, TokenRefresher, get_device_id,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and store the session
    Login {
        /// Account email
        #[arg(long)]
        email: String,

        /// Account password
        #[arg(long, env = "SCHEDULER_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create a new account
    Register {
        #[arg(long)]
        email: String,

        #[arg(long, env = "SCHEDULER_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,
    },

    /// End the stored session
    Logout,

    /// Exchange the refresh cookie for a new access token once
    Refresh,

    /// Change the password of the logged in account
    ChangePassword {
        /// New password
        #[arg(long, env = "SCHEDULER_NEW_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Show the stored session state
    Status,

    /// Print this installation's device identifier
    DeviceId,

    /// Keep the session fresh until interrupted
    Run,

    /// Configuration file helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a configuration file with default values
    Init {
        /// Output file path (defaults to <data dir>/scheduler.toml, which
        /// later commands read when no --config is given)
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Commands {
    /// Commands that run until interrupted and must not be timed out
    pub const fn is_long_running(&self) -> bool {
        matches!(self, Self::Run)
    }

    pub async fn execute(self, config_path: Option<PathBuf>, data_dir: Option<PathBuf>) -> Result<()> {
        let load_config = || -> Result<ClientConfig> {
            // Fall back to the file `config init` writes by default
            let config_path = config_path.clone().or_else(|| {
                let generated = data_dir
                    .clone()
                    .unwrap_or_else(default_data_dir)
                    .join(CONFIG_FILE);
                generated.exists().then_some(generated)
            });
            let config = ClientConfig::load(config_path.as_deref())?;
            Ok(match &data_dir {
                Some(dir) => config.with_data_dir(dir),
                None => config,
            })
        };

        match self {
            Self::Login { email, password } => login(&load_config()?, &email, &password).await,
            Self::Register {
                email,
                password,
                first_name,
                last_name,
            } => {
                let request = RegisterRequest {
                    email,
                    password,
                    first_name,
                    last_name,
                };
                register(&load_config()?, &request).await
            }
            Self::Logout => logout(&load_config()?).await,
            Self::Refresh => refresh(&load_config()?).await,
            Self::ChangePassword { password } => {
                change_password(&load_config()?, &password).await
            }
            Self::Status => status(&load_config()?),
            Self::DeviceId => device_id(&load_config()?),
            Self::Run => run(&load_config()?).await,
            Self::Config { command } => command.execute(data_dir.clone()),
        }
    }
}

impl ConfigCommands {
    pub fn execute(self, data_dir: Option<PathBuf>) -> Result<()> {
        match self {
            Self::Init { output, force } => {
                let data_dir = data_dir.unwrap_or_else(default_data_dir);
                let config_path = output.unwrap_or_else(|| data_dir.join(CONFIG_FILE));

                if config_path.exists() && !force {
                    bail!(
                        "{} already exists, pass --force to overwrite",
                        config_path.display()
                    );
                }

                ClientConfig::default()
                    .with_data_dir(&data_dir)
                    .save(&config_path)?;
                println!("Generated configuration at: {}", config_path.display());
                Ok(())
            }
        }
    }
}

fn open_session(config: &ClientConfig) -> Result<(SessionManager, Arc<History>)> {
    let storage = Arc::new(FileStorage::open(&config.storage.path)?);
    let store = Arc::new(SessionStore::new(storage));
    let history = Arc::new(History::new());

    let manager = SessionManager::new(config.api_client()?, store, history.clone())
        .with_refresh_cookie_days(config.session.refresh_cookie_days);

    Ok((manager, history))
}

async fn login(config: &ClientConfig, email: &str, password: &str) -> Result<()> {
    let (manager, history) = open_session(config)?;
    manager.login(email, password).await?;
    println!("Logged in as {email}");
    println!("Now at {}", history.current().path());
    Ok(())
}

async fn register(config: &ClientConfig, request: &RegisterRequest) -> Result<()> {
    let (manager, _) = open_session(config)?;
    let profile = manager.register(request).await?;
    println!(
        "Registered {} {} <{}>",
        profile.first_name, profile.last_name, profile.email
    );
    Ok(())
}

async fn logout(config: &ClientConfig) -> Result<()> {
    let (manager, _) = open_session(config)?;
    match manager.logout().await {
        LogoutOutcome::LoggedOut => {
            println!("Logged out");
            Ok(())
        }
        LogoutOutcome::NotLoggedIn => bail!("Not logged in"),
        LogoutOutcome::Failed { status: Some(status) } => {
            bail!("Logout rejected by server with status {status}")
        }
        LogoutOutcome::Failed { status: None } => bail!("Logout request failed"),
    }
}

async fn refresh(config: &ClientConfig) -> Result<()> {
    let (manager, _) = open_session(config)?;
    match manager.refresh_token().await {
        RefreshOutcome::Refreshed => {
            println!("Access token refreshed");
            Ok(())
        }
        outcome => bail!("Token refresh did not complete: {outcome:?}"),
    }
}

async fn change_password(config: &ClientConfig, password: &str) -> Result<()> {
    let (manager, _) = open_session(config)?;
    manager.change_password(password).await?;
    println!("Password changed");
    Ok(())
}

fn status(config: &ClientConfig) -> Result<()> {
    let (manager, _) = open_session(config)?;
    let device_id = get_device_id(manager.store().storage())?;

    println!("API:           {}", manager.client().base_url());
    println!("Storage:       {}", config.storage.path.display());
    println!("Device id:     {device_id}");
    println!(
        "Access token:  {}",
        if manager.is_authenticated() { "present" } else { "absent" }
    );
    println!(
        "Refresh cookie: {}",
        if manager.client().refresh_cookie().is_some() {
            "present"
        } else {
            "absent"
        }
    );
    Ok(())
}

fn device_id(config: &ClientConfig) -> Result<()> {
    let storage = FileStorage::open(&config.storage.path)?;
    println!("{}", get_device_id(&storage)?);
    Ok(())
}

async fn run(config: &ClientConfig) -> Result<()> {
    let (manager, _) = open_session(config)?;
    let handle = TokenRefresher::spawn(manager, config.refresh_interval());

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    handle.shutdown().await;
    Ok(())
}
