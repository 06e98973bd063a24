use std::io;
use std::path::PathBuf;

use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};

use taskgraph::commands::{
    data, dep, project, task, DataCommand, DataResult, DepCommand, DepResult, ProjectCommand,
    ProjectResult, TaskCommand, TaskResult,
};
use taskgraph::config::Config;
use taskgraph::{db, error, logging};

mod output;

use output::Printer;

#[derive(Parser)]
#[command(name = "tg")]
#[command(version)]
#[command(
    about = "taskgraph - task dependency graph and scheduling constraints",
    long_about = r#"
taskgraph (tg) - Precedence constraints between the tasks of a project.

Features:
  • Finish-to-start, start-to-start, finish-to-finish, start-to-finish edges
  • Lag/lead in days with earliest start/finish dates
  • Cycle rejection with the offending path
  • Blocking status derived from live task state

Environment:
  TASKGRAPH_DB_PATH             Override database location
  TASKGRAPH_BUSY_TIMEOUT_MS     SQLite busy timeout
  TASKGRAPH_MAX_WRITE_ATTEMPTS  Retries for contended dependency writes
  TASKGRAPH_DANGLING            satisfied | blocking (missing predecessors)
  TASKGRAPH_LOG                 Log filter (tracing EnvFilter syntax)
  NO_COLOR                      Disable colored output
"#
)]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output in JSON format (for programmatic use)
    #[arg(long, global = true)]
    json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Override database path (default: CWD/.taskgraph/graph.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Project management
    #[command(subcommand)]
    Project(ProjectCommand),

    /// Task management
    #[command(subcommand)]
    Task(TaskCommand),

    /// Dependency edges, views and blocking queries
    #[command(subcommand)]
    Dep(DepCommand),

    /// Data import/export
    #[command(subcommand)]
    Data(DataCommand),

    /// Generate shell completions
    #[command(
        about = "Generate shell completions",
        long_about = r#"
Generate shell completions for tg CLI.

Examples:
  tg completions bash > ~/.local/share/bash-completion/completions/tg
  tg completions zsh > ~/.zfunc/_tg
  tg completions fish > ~/.config/fish/completions/tg.fish
"#
    )]
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell, elvish)
        shell: Shell,
    },

    /// Initialize database
    #[command(
        about = "Initialize database",
        long_about = r#"
Initialize the taskgraph database.

The database is created at:
  1. --db (if given)
  2. TASKGRAPH_DB_PATH (if set)
  3. CWD/.taskgraph/graph.db (fallback)

Usually runs automatically on first command.
"#
    )]
    Init,
}

fn main() {
    let cli = Cli::parse();

    // PRECONDITION: Completions bypass normal output flow - raw shell script to stdout
    if let Command::Completions { shell } = &cli.command {
        generate(*shell, &mut Cli::command(), "tg", &mut io::stdout());
        return;
    }

    logging::init(cli.verbose);
    let config = Config::load(cli.db.clone());
    tracing::debug!(db = %config.db_path.display(), "resolved configuration");

    match run(&cli.command, &config) {
        Ok(output) => {
            if cli.json {
                println!("{}", output);
            } else {
                let printer = Printer::new(cli.no_color);
                printer.print(&cli.command, &output);
            }
        }
        Err(e) => {
            if cli.json {
                let err = serde_json::json!({ "error": e.to_string() });
                eprintln!("{}", err);
            } else {
                let printer = Printer::new_for_stderr(cli.no_color);
                printer.print_error(&format!("Error: {}", e));
            }
            std::process::exit(1);
        }
    }
}

fn run(command: &Command, config: &Config) -> error::Result<String> {
    let settings = config.service_settings();
    match command {
        Command::Init => {
            db::open_db(&config.db_path, config.busy_timeout)?;
            Ok(serde_json::json!({ "initialized": true, "path": config.db_path }).to_string())
        }
        Command::Project(cmd) => {
            let conn = db::open_db(&config.db_path, config.busy_timeout)?;
            match project::handle(&conn, settings, cmd.clone())? {
                ProjectResult::One(p) => Ok(serde_json::to_string_pretty(&p)?),
                ProjectResult::Many(ps) => Ok(serde_json::to_string_pretty(&ps)?),
                ProjectResult::Status(s) => Ok(serde_json::to_string_pretty(&s)?),
            }
        }
        Command::Task(cmd) => {
            let conn = db::open_db(&config.db_path, config.busy_timeout)?;
            match task::handle(&conn, cmd.clone())? {
                TaskResult::One(t) => Ok(serde_json::to_string_pretty(&t)?),
                TaskResult::Many(ts) => Ok(serde_json::to_string_pretty(&ts)?),
                TaskResult::Deleted => Ok(serde_json::json!({ "deleted": true }).to_string()),
            }
        }
        Command::Dep(cmd) => {
            let conn = db::open_db(&config.db_path, config.busy_timeout)?;
            match dep::handle(&conn, settings, cmd.clone())? {
                DepResult::Added(edge) => Ok(serde_json::to_string_pretty(&edge)?),
                DepResult::Removed(outcome) => Ok(serde_json::to_string_pretty(&outcome)?),
                DepResult::Edges(edges) => Ok(serde_json::to_string_pretty(&edges)?),
                DepResult::View(view) => Ok(serde_json::to_string_pretty(&view)?),
                DepResult::Candidates(tasks) => Ok(serde_json::to_string_pretty(&tasks)?),
                DepResult::Blocked(blocked) => Ok(serde_json::to_string_pretty(&blocked)?),
            }
        }
        Command::Data(cmd) => {
            let conn = db::open_db(&config.db_path, config.busy_timeout)?;
            match data::handle(&conn, settings, cmd.clone())? {
                DataResult::Exported {
                    path,
                    tasks,
                    dependencies,
                } => Ok(serde_json::json!({
                    "exported": true,
                    "path": path,
                    "tasks": tasks,
                    "dependencies": dependencies,
                })
                .to_string()),
                DataResult::Imported {
                    project,
                    tasks,
                    dependencies,
                    rejected,
                } => Ok(serde_json::json!({
                    "imported": true,
                    "project": project,
                    "tasks": tasks,
                    "dependencies": dependencies,
                    "rejected": rejected,
                })
                .to_string()),
            }
        }
        // PRECONDITION: Completions handled in main() before run() is called
        Command::Completions { .. } => unreachable!("completions handled before run()"),
    }
}
