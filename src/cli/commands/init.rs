//! Implementation of the `circuitflow init` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio::fs;

use crate::adapters::sqlite::initialize_database;
use crate::cli::output::{output, CommandOutput};
use crate::infrastructure::config::{ConfigLoader, CONFIG_DIR};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Force reinitialization even if already initialized
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub initialized_path: PathBuf,
    pub config_written: bool,
    pub database_initialized: bool,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if self.config_written {
            lines.push(format!("\nConfig written to {CONFIG_DIR}/config.yaml"));
        }
        if self.database_initialized {
            lines.push(format!("Database initialized at {CONFIG_DIR}/circuitflow.db"));
        }
        lines.join("\n")
    }
}

pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let target_path = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(&args.path)
    };
    let out = initialize(target_path, args.force).await?;
    output(&out, json_mode);
    Ok(())
}

async fn initialize(target_path: PathBuf, force: bool) -> Result<InitOutput> {
    let config_dir = target_path.join(CONFIG_DIR);

    if config_dir.exists() && !force {
        return Ok(InitOutput {
            success: false,
            message: "Project already initialized. Use --force to reinitialize.".to_string(),
            initialized_path: target_path,
            config_written: false,
            database_initialized: false,
        });
    }

    if force && config_dir.exists() {
        fs::remove_dir_all(&config_dir)
            .await
            .with_context(|| format!("Failed to remove existing {CONFIG_DIR} directory"))?;
    }

    fs::create_dir_all(config_dir.join("logs"))
        .await
        .with_context(|| format!("Failed to create {}", config_dir.display()))?;

    let yaml = ConfigLoader::default_yaml()?;
    fs::write(config_dir.join("config.yaml"), yaml)
        .await
        .context("Failed to write config.yaml")?;

    let db_url = format!("sqlite:{}", config_dir.join("circuitflow.db").display());
    let pool = initialize_database(&db_url, None)
        .await
        .context("Failed to initialize database")?;
    pool.close().await;

    Ok(InitOutput {
        success: true,
        message: if force {
            "Project reinitialized successfully.".to_string()
        } else {
            "Project initialized successfully.".to_string()
        },
        initialized_path: target_path,
        config_written: true,
        database_initialized: true,
    })
}
