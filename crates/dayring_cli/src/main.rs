//! `dayring` executable: operator commands and the resync daemon.

mod commands;
mod config;

use anyhow::{anyhow, Result};
use clap::Parser;
use commands::{App, NormalInput, NormalPatch};
use config::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let is_daemon = matches!(cli.command, Commands::Run { .. });
    let logging = cli.logging_config(is_daemon)?;
    dayring_core::init_logging(&logging).map_err(|err| anyhow!(err))?;

    let run_on_start = !matches!(
        cli.command,
        Commands::Run {
            no_initial_resync: true
        }
    );
    let app = App::open(&cli.db, cli.trigger_config(run_on_start))?;

    match cli.command {
        Commands::Run { .. } => app.run().await,
        Commands::Resync => app.resync().await,
        Commands::Schedule => app.schedule(),
        Commands::AddNormal {
            title,
            time,
            frequency,
            delay,
            tone,
            inactive,
        } => {
            app.add_normal(NormalInput {
                title,
                time,
                frequency,
                delay,
                tone,
                active: !inactive,
            })
            .await
        }
        Commands::AddSpecial {
            description,
            date,
            time,
            tone,
        } => app.add_special(description, &date, &time, tone).await,
        Commands::UpdateNormal {
            id,
            title,
            time,
            frequency,
            delay,
            tone,
            active,
        } => {
            app.update_normal(
                id,
                NormalPatch {
                    title,
                    time,
                    frequency,
                    delay,
                    tone,
                    active,
                },
            )
            .await
        }
        Commands::DeleteNormal { id } => app.delete_normal(id).await,
        Commands::CompleteSpecial { id } => app.complete_special(id).await,
        Commands::DeleteSpecial { id } => app.delete_special(id).await,
        Commands::List => app.list(),
    }
}
