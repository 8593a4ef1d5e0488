use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use taskboard::config::{CliOverrides, ClientConfig};
use taskboard::logging::{self, LogOptions};

mod cmd;

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(version, about = "Kanban board client with live updates")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Also write logs to a daily-rolling file in this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Path to taskboard.toml (defaults to ./taskboard.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL, e.g. http://localhost:8000
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Push channel base URL, e.g. ws://localhost:8000
    #[arg(long, global = true)]
    pub ws_url: Option<String>,

    /// Where the credential and auth state are stored
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in with an access token
    Login {
        #[arg(env = "TASKBOARD_TOKEN")]
        token: String,
    },
    /// Forget the stored credential
    Logout,
    /// Show the logged-in user
    Whoami,
    /// List boards
    Boards,
    /// Show, watch or manage a board
    Board {
        #[command(subcommand)]
        command: BoardCommands,
    },
    /// Create, edit, move or delete tasks
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Teams and membership
    Team {
        #[command(subcommand)]
        command: TeamCommands,
    },
    /// List sprints
    Sprints {
        #[arg(long)]
        team: Option<String>,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum BoardCommands {
    /// Print a board column by column
    Show {
        board_id: String,
        /// Print the board as JSON
        #[arg(long)]
        json: bool,
    },
    /// Follow a board live over the push channel
    Watch { board_id: String },
    /// Create a board
    Create {
        name: String,
        #[arg(long)]
        team: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a board
    Delete { board_id: String },
}

#[derive(Subcommand, Clone)]
pub enum TaskCommands {
    Create {
        board_id: String,
        title: String,
        #[arg(long)]
        column: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long = "type")]
        task_type: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    Update {
        board_id: String,
        task_id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        assignee: Option<String>,
    },
    /// Move a task to a column, optionally at a given index
    Move {
        board_id: String,
        task_id: String,
        column: String,
        #[arg(long)]
        index: Option<usize>,
    },
    Delete { board_id: String, task_id: String },
}

#[derive(Subcommand, Clone)]
pub enum TeamCommands {
    List,
    Show {
        team_id: String,
    },
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    AddMember {
        team_id: String,
        email: String,
        #[arg(long)]
        role: Option<String>,
    },
    SetRole {
        team_id: String,
        user_id: String,
        role: String,
    },
    RemoveMember {
        team_id: String,
        user_id: String,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Validate configuration
    Validate,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let _log_guard = match logging::init(&LogOptions {
        verbose: cli.verbose,
        json: cli.json_logs,
        log_dir: cli.log_dir.clone(),
    }) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            None
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let overrides = CliOverrides {
        api_url: cli.api_url.clone(),
        ws_url: cli.ws_url.clone(),
        state_dir: cli.state_dir.clone(),
    };

    if let Commands::Config { command } = &cli.command {
        return cmd::cmd_config(cli.config.as_deref(), &overrides, command.clone());
    }

    let config = ClientConfig::load(cli.config.as_deref(), &overrides)?;
    let app = cmd::App::new(config)?;

    match cli.command {
        Commands::Login { token } => cmd::cmd_login(&app, &token).await?,
        Commands::Logout => cmd::cmd_logout(&app)?,
        Commands::Whoami => cmd::cmd_whoami(&app).await?,
        Commands::Boards => cmd::cmd_boards(&app).await?,
        Commands::Board { command } => cmd::cmd_board(&app, command).await?,
        Commands::Task { command } => cmd::cmd_task(&app, command).await?,
        Commands::Team { command } => cmd::cmd_team(&app, command).await?,
        Commands::Sprints { team } => cmd::cmd_sprints(&app, team.as_deref()).await?,
        Commands::Config { .. } => {}
    }

    Ok(())
}
