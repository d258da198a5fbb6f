use clap::{Parser, Subcommand};

pub mod commands;
pub mod workspace;

#[derive(Parser)]
#[command(name = "kanban-engine")]
#[command(about = "Workflow transition engine for kanban business processes")]
#[command(long_about = "Moves process instances through kanban workflow states. Prerequisites are \
                       advisory, forced moves are audited, and processes advance on their own while \
                       their prerequisites hold. Start with 'kanban-engine validate <definition>'.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check workflow definition files for structural problems
    Validate {
        /// Definition files (.json or .toml)
        #[arg(required = true)]
        files: Vec<std::path::PathBuf>,
    },
    /// Create a process at the initial state and advance it once
    Create {
        /// Workflow (kanban) id
        #[arg(long, short = 'k')]
        kanban: String,
        /// Process id; generated when omitted
        #[arg(long)]
        id: Option<String>,
        /// Initial process data as a JSON object
        #[arg(long, default_value = "{}")]
        data: String,
    },
    /// Update one process_data field (dotted path)
    SetField {
        process_id: String,
        /// Dotted path, e.g. cliente.aprovado
        path: String,
        /// JSON value; anything that is not valid JSON is stored as a string
        value: String,
        /// Do not run auto-progression after the update
        #[arg(long)]
        no_advance: bool,
    },
    /// Move a process to another state
    Transition {
        process_id: String,
        to_state: String,
        /// Who is moving the process
        #[arg(long, default_value = "cli")]
        actor: String,
        /// user, agent or system
        #[arg(long, default_value = "user")]
        actor_type: String,
        /// Free-text justification (required for forced agent moves)
        #[arg(long, short = 'j')]
        justification: Option<String>,
        /// Trigger label stored on the record
        #[arg(long)]
        trigger: Option<String>,
        /// Skip auto-progression after the transition
        #[arg(long)]
        no_cascade: bool,
    },
    /// Advance one process as far as its prerequisites allow
    Advance { process_id: String },
    /// Advance every non-final process of one or more workflows
    Sweep {
        #[arg(long = "kanban", short = 'k', required = true)]
        kanbans: Vec<String>,
    },
    /// Sweep periodically until Ctrl-C
    Watch {
        #[arg(long = "kanban", short = 'k', required = true)]
        kanbans: Vec<String>,
        /// Seconds between sweeps; defaults to engine.sweep_interval_seconds
        #[arg(long)]
        interval: Option<u64>,
        /// Stop after this many passes
        #[arg(long)]
        passes: Option<usize>,
    },
    /// Query the audit trail
    Audit {
        #[arg(long)]
        process: Option<String>,
        #[arg(long, short = 'k')]
        kanban: Option<String>,
        #[arg(long)]
        actor: Option<String>,
        #[arg(long)]
        actor_type: Option<String>,
        /// Only forced transitions
        #[arg(long)]
        forced: bool,
        /// Only records from the last N hours
        #[arg(long)]
        since_hours: Option<u64>,
        /// Show the N most recent records, newest first
        #[arg(long)]
        limit: Option<usize>,
        /// Print JSON lines instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Compliance score for a workflow
    Compliance {
        #[arg(long, short = 'k')]
        kanban: String,
        /// Window in hours; defaults to audit.compliance_window_hours
        #[arg(long, conflicts_with = "all")]
        hours: Option<u64>,
        /// Score the whole history
        #[arg(long)]
        all: bool,
        #[arg(long)]
        json: bool,
    },
}
