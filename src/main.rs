use anyhow::Result;
use clap::Parser;

use kanban_engine::cli::commands::{
    advance::AdvanceCommand, audit::AuditCommand, compliance::ComplianceCommand, create::CreateCommand,
    set_field::SetFieldCommand, show_how_to_get_started, sweep::SweepCommand,
    transition::TransitionCommand, validate::ValidateCommand, watch::WatchCommand,
};
use kanban_engine::cli::workspace::Workspace;
use kanban_engine::cli::{Cli, Commands};
use kanban_engine::config::{config, init_config, KanbanEngineConfig};
use kanban_engine::telemetry::{init_telemetry, shutdown_telemetry};

fn main() -> Result<()> {
    let cli = Cli::parse();

    KanbanEngineConfig::load_env_file()?;
    let config = config()?;
    init_telemetry(&config.observability)?;
    init_config()?;

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(dispatch(cli.command, config.clone()));
    shutdown_telemetry();
    result
}

async fn dispatch(command: Option<Commands>, config: KanbanEngineConfig) -> Result<()> {
    let workspace = Workspace::new(config);

    match command {
        None => show_how_to_get_started().await,
        Some(Commands::Validate { files }) => ValidateCommand::new(files).execute().await,
        Some(Commands::Create { kanban, id, data }) => {
            CreateCommand::new(kanban, id, data).execute(&workspace).await
        }
        Some(Commands::SetField {
            process_id,
            path,
            value,
            no_advance,
        }) => {
            SetFieldCommand::new(process_id, path, value)
                .with_advance(!no_advance)
                .execute(&workspace)
                .await
        }
        Some(Commands::Transition {
            process_id,
            to_state,
            actor,
            actor_type,
            justification,
            trigger,
            no_cascade,
        }) => {
            TransitionCommand::new(process_id, to_state, actor, actor_type)
                .with_justification(justification)
                .with_trigger(trigger)
                .with_cascade(!no_cascade)
                .execute(&workspace)
                .await
        }
        Some(Commands::Advance { process_id }) => AdvanceCommand::new(process_id).execute(&workspace).await,
        Some(Commands::Sweep { kanbans }) => SweepCommand::new(kanbans).execute(&workspace).await,
        Some(Commands::Watch {
            kanbans,
            interval,
            passes,
        }) => {
            WatchCommand::new(kanbans)
                .with_interval(interval)
                .with_passes(passes)
                .execute(&workspace)
                .await
        }
        Some(Commands::Audit {
            process,
            kanban,
            actor,
            actor_type,
            forced,
            since_hours,
            limit,
            json,
        }) => {
            AuditCommand {
                process_id: process,
                kanban_id: kanban,
                actor,
                actor_type,
                forced_only: forced,
                since_hours,
                limit,
                json,
            }
            .execute(&workspace)
            .await
        }
        Some(Commands::Compliance {
            kanban,
            hours,
            all,
            json,
        }) => {
            ComplianceCommand::new(kanban, hours, all, json)
                .execute(&workspace)
                .await
        }
    }
}
