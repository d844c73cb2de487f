//! Tasks Admin
//!
//! Maintenance CLI for the ordered task lists: print a board, audit it for
//! duplicate or missing positions, repack legacy lists, and seed a starter
//! board for development.

use clap::{Parser, Subcommand};
use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::Environment;
use domain_tasks::{PgTaskRepository, TaskService, TaskStatus};
use eyre::{Result, WrapErr};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

mod commands;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "tasks-admin")]
#[command(about = "Inspect and maintain ordered task boards")]
struct Cli {
    /// Do not apply pending migrations on startup
    #[arg(long, global = true)]
    skip_migrations: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print an owner's board as JSON
    List {
        #[arg(short, long)]
        owner: Uuid,
    },

    /// Report duplicate and missing positions; exits non-zero when any are found
    Audit {
        #[arg(short, long)]
        owner: Uuid,
    },

    /// Re-index positions to 0..n-1, keeping the current order
    Repack {
        #[arg(short, long)]
        owner: Uuid,

        /// List to repack (todo, done). Defaults to both.
        #[arg(short, long)]
        status: Option<TaskStatus>,
    },

    /// Load the starter board for an owner
    Seed {
        #[arg(short, long)]
        owner: Uuid,

        /// Add the starter tasks even if the board is not empty
        #[arg(long)]
        append: bool,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;
    let environment = Environment::from_env();
    init_tracing(&environment);

    let cli = Cli::parse();

    info!("Connecting to database...");
    let db = database::postgres::connect_with_retry(config.database.clone(), config.retry())
        .await
        .wrap_err("Database connection failed")?;
    database::postgres::check_health(&db).await?;

    if !cli.skip_migrations {
        database::postgres::run_migrations::<migration::Migrator>(&db, "tasks-admin").await?;
    }

    let service = TaskService::new(PgTaskRepository::new(db));

    match cli.command {
        Commands::List { owner } => {
            print_json(&commands::list(&service, owner).await?)?;
        }

        Commands::Audit { owner } => {
            let report = commands::audit(&service, owner).await?;
            print_json(&report)?;
            if !report.clean {
                eyre::bail!("{} position violations found", report.violations.len());
            }
        }

        Commands::Repack { owner, status } => {
            print_json(&commands::repack(&service, owner, status).await?)?;
        }

        Commands::Seed { owner, append } => {
            print_json(&commands::seed(&service, owner, append).await?)?;
        }
    }

    Ok(())
}
