use std::io::IsTerminal;

use owo_colors::{OwoColorize, Style};

use taskgraph::commands::data::RejectedDependency;
use taskgraph::commands::project::ProjectStatus;
use taskgraph::commands::{DataCommand, DepCommand, ProjectCommand, TaskCommand};
use taskgraph::core::{BlockedTask, DependencyView, RemoveOutcome};
use taskgraph::types::{DependencyEdge, DependencyType, Project, Task};

use crate::Command;

/// Display classification of a task
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Standing {
    Completed,
    Blocked,
    Ready,
}

impl Standing {
    fn classify(completed: bool, blocked: bool) -> Self {
        if completed {
            Self::Completed
        } else if blocked {
            Self::Blocked
        } else {
            Self::Ready
        }
    }
}

/// Color policy: --no-color > NO_COLOR env > TERM=dumb > !isatty > default (color)
fn should_use_color_for(no_color_flag: bool, is_tty: bool) -> bool {
    if no_color_flag {
        return false;
    }
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    if std::env::var("TERM").ok().as_deref() == Some("dumb") {
        return false;
    }
    is_tty
}

fn should_use_color(no_color_flag: bool) -> bool {
    should_use_color_for(no_color_flag, std::io::stdout().is_terminal())
}

fn should_use_color_stderr(no_color_flag: bool) -> bool {
    should_use_color_for(no_color_flag, std::io::stderr().is_terminal())
}

struct Colors {
    id: Style,
    completed: Style,
    pending: Style,
    blocked: Style,
    heading: Style,
    muted: Style,
    error: Style,
}

impl Colors {
    fn new(use_color: bool) -> Self {
        if use_color {
            Self {
                id: Style::new().cyan().dimmed(),
                completed: Style::new().green(),
                pending: Style::new().yellow(),
                blocked: Style::new().red(),
                heading: Style::new().bold(),
                muted: Style::new().dimmed(),
                error: Style::new().red().bold(),
            }
        } else {
            Self {
                id: Style::new(),
                completed: Style::new(),
                pending: Style::new(),
                blocked: Style::new(),
                heading: Style::new(),
                muted: Style::new(),
                error: Style::new(),
            }
        }
    }
}

/// Handles human-readable CLI output.
pub struct Printer {
    colors: Colors,
}

impl Printer {
    pub fn new(no_color_flag: bool) -> Self {
        Self {
            colors: Colors::new(should_use_color(no_color_flag)),
        }
    }

    pub fn new_for_stderr(no_color_flag: bool) -> Self {
        Self {
            colors: Colors::new(should_use_color_stderr(no_color_flag)),
        }
    }

    pub fn print_error(&self, message: &str) {
        eprintln!("{}", message.style(self.colors.error));
    }

    fn fmt_id(&self, id: &impl std::fmt::Display) -> String {
        format!("{}", id.to_string().style(self.colors.id))
    }

    fn standing_symbol_style(&self, standing: Standing) -> (&'static str, Style) {
        match standing {
            Standing::Completed => ("✓", self.colors.completed),
            Standing::Blocked => ("⊘", self.colors.blocked),
            Standing::Ready => ("○", self.colors.pending),
        }
    }

    pub fn print(&self, command: &Command, output: &str) {
        match command {
            Command::Init => self.print_init(output),
            Command::Project(ProjectCommand::List) => self.print_project_list(output),
            Command::Project(ProjectCommand::Status { .. }) => self.print_project_status(output),
            Command::Project(_) => self.print_project(output),
            Command::Task(TaskCommand::Delete { .. }) => println!("Task deleted"),
            Command::Task(TaskCommand::List { .. }) => self.print_task_list(output),
            Command::Task(_) => self.print_task(output),
            Command::Dep(DepCommand::Add(_)) => self.print_edge_added(output),
            Command::Dep(DepCommand::Remove { .. }) => self.print_edge_removed(output),
            Command::Dep(DepCommand::List(_)) => self.print_edge_list(output),
            Command::Dep(DepCommand::View { .. }) => self.print_view(output),
            Command::Dep(DepCommand::Candidates { .. }) => self.print_task_list(output),
            Command::Dep(DepCommand::Blocked { .. }) => self.print_blocked(output),
            Command::Data(DataCommand::Export { .. }) => self.print_data_export(output),
            Command::Data(DataCommand::Import { .. }) => self.print_data_import(output),
            // PRECONDITION: Completions handled in main() before print() is called
            Command::Completions { .. } => unreachable!("completions handled before print()"),
        }
    }

    fn print_init(&self, output: &str) {
        let path = serde_json::from_str::<serde_json::Value>(output)
            .ok()
            .and_then(|json| json.get("path").and_then(|v| v.as_str()).map(String::from));
        match path {
            Some(path) => println!("Initialized taskgraph database at {}", path),
            None => println!("Initialized taskgraph database"),
        }
    }

    fn print_project(&self, output: &str) {
        if let Ok(project) = serde_json::from_str::<Project>(output) {
            println!(
                "Project: {} {}",
                self.fmt_id(&project.id),
                project.name.style(self.colors.heading)
            );
        } else {
            println!("{}", output);
        }
    }

    fn print_project_list(&self, output: &str) {
        match serde_json::from_str::<Vec<Project>>(output) {
            Ok(projects) if projects.is_empty() => println!("No projects found"),
            Ok(projects) => {
                for p in &projects {
                    println!("{} - {}", self.fmt_id(&p.id), p.name);
                }
            }
            Err(_) => println!("{}", output),
        }
    }

    fn print_project_status(&self, output: &str) {
        if let Ok(status) = serde_json::from_str::<ProjectStatus>(output) {
            println!("{}", status.project.name.style(self.colors.heading));
            self.print_progress_summary(
                status.progress.total,
                status.progress.completed,
                status.progress.blocked,
                status.progress.ready,
            );
        } else {
            println!("{}", output);
        }
    }

    /// "X/Y complete | Z blocked | W ready"
    fn print_progress_summary(&self, total: usize, completed: usize, blocked: usize, ready: usize) {
        println!(
            "{}/{} complete | {} blocked | {} ready",
            completed.style(self.colors.completed),
            total,
            blocked.style(self.colors.blocked),
            ready.style(self.colors.pending),
        );
    }

    fn status_style(&self, task: &Task) -> Style {
        if task.status.is_completed() {
            self.colors.completed
        } else if task.status.has_started() {
            self.colors.pending
        } else {
            Style::new()
        }
    }

    fn print_task(&self, output: &str) {
        if let Ok(task) = serde_json::from_str::<Task>(output) {
            println!(
                "Task: {} ({})",
                self.fmt_id(&task.id),
                task.status.label().style(self.status_style(&task))
            );
            println!("  Title: {}", task.title);
            println!("  Project: {}", self.fmt_id(&task.project_id));
            println!("  Progress: {}%", task.progress);
            if let Some(start) = task.start_date {
                println!("  Start: {}", start);
            }
            if let Some(due) = task.due_date {
                println!("  Due: {}", due);
            }
            if let Some(at) = task.completed_at {
                println!("  Completed: {}", at.format("%Y-%m-%d %H:%M"));
            }
        } else {
            println!("{}", output);
        }
    }

    fn print_task_list(&self, output: &str) {
        match serde_json::from_str::<Vec<Task>>(output) {
            Ok(tasks) if tasks.is_empty() => println!("No tasks found"),
            Ok(tasks) => {
                for t in &tasks {
                    println!(
                        "{} - {} [{}]",
                        self.fmt_id(&t.id),
                        t.title,
                        t.status.label().style(self.status_style(t))
                    );
                }
            }
            Err(_) => println!("{}", output),
        }
    }

    fn fmt_relation(&self, dependency_type: DependencyType, lag_days: i32) -> String {
        let lag = match lag_days {
            0 => String::new(),
            lag if lag > 0 => format!(" +{lag}d"),
            lag => format!(" -{}d", lag.unsigned_abs()),
        };
        format!(
            "{}",
            format!("{}{}", dependency_type.abbrev(), lag).style(self.colors.muted)
        )
    }

    fn print_edge_added(&self, output: &str) {
        if let Ok(edge) = serde_json::from_str::<DependencyEdge>(output) {
            println!(
                "Added {}: {} depends on {} ({})",
                self.fmt_id(&edge.id),
                self.fmt_id(&edge.task_id),
                self.fmt_id(&edge.depends_on_task_id),
                self.fmt_relation(edge.dependency_type, edge.lag_days)
            );
        } else {
            println!("{}", output);
        }
    }

    fn print_edge_removed(&self, output: &str) {
        if let Ok(outcome) = serde_json::from_str::<RemoveOutcome>(output) {
            if outcome.removed {
                println!("Removed {}", self.fmt_id(&outcome.edge_id));
            } else {
                println!("{} was already removed", self.fmt_id(&outcome.edge_id));
            }
        } else {
            println!("{}", output);
        }
    }

    fn print_edge_list(&self, output: &str) {
        match serde_json::from_str::<Vec<DependencyEdge>>(output) {
            Ok(edges) if edges.is_empty() => println!("No dependencies found"),
            Ok(edges) => {
                for edge in &edges {
                    println!(
                        "{}  {} -> {} ({})",
                        self.fmt_id(&edge.id),
                        self.fmt_id(&edge.task_id),
                        self.fmt_id(&edge.depends_on_task_id),
                        self.fmt_relation(edge.dependency_type, edge.lag_days)
                    );
                }
            }
            Err(_) => println!("{}", output),
        }
    }

    fn print_view(&self, output: &str) {
        let Ok(view) = serde_json::from_str::<DependencyView>(output) else {
            println!("{}", output);
            return;
        };

        let standing = Standing::classify(view.status.is_completed(), view.is_blocking);
        let (symbol, style) = self.standing_symbol_style(standing);
        println!(
            "[{}] {} - {} ({})",
            symbol.style(style),
            self.fmt_id(&view.task_id),
            view.title.style(self.colors.heading),
            view.status.label()
        );
        if let Some(start) = view.earliest_start {
            println!("  Earliest start: {}", start);
        }
        if let Some(finish) = view.earliest_finish {
            println!("  Earliest finish: {}", finish);
        }

        if view.predecessors.is_empty() {
            println!("  Depends on: nothing");
        } else {
            println!("  Depends on:");
            for pred in &view.predecessors {
                let (symbol, style) = if pred.satisfied {
                    ("✓", self.colors.completed)
                } else {
                    ("⊘", self.colors.blocked)
                };
                let title = pred.title.as_deref().unwrap_or("(missing task)");
                let label = pred.status_label.as_deref().unwrap_or("-");
                println!(
                    "    [{}] {} - {} [{}] ({})",
                    symbol.style(style),
                    self.fmt_id(&pred.task_id),
                    title,
                    label,
                    self.fmt_relation(pred.dependency_type, pred.lag_days)
                );
                if let Some(reason) = &pred.reason {
                    println!("        {}", reason.style(self.colors.muted));
                }
            }
        }

        if !view.successors.is_empty() {
            println!("  Blocks:");
            for succ in &view.successors {
                println!(
                    "    {} - {} ({})",
                    self.fmt_id(&succ.task_id),
                    succ.title,
                    self.fmt_relation(succ.dependency_type, succ.lag_days)
                );
            }
        }
    }

    fn print_blocked(&self, output: &str) {
        match serde_json::from_str::<Vec<BlockedTask>>(output) {
            Ok(blocked) if blocked.is_empty() => println!("No blocked tasks"),
            Ok(blocked) => {
                let (symbol, style) = self.standing_symbol_style(Standing::Blocked);
                for entry in &blocked {
                    println!(
                        "[{}] {} - {}",
                        symbol.style(style),
                        self.fmt_id(&entry.task.id),
                        entry.task.title
                    );
                    for detail in entry.status.unsatisfied() {
                        if let Some(reason) = &detail.reason {
                            println!("    {}", reason.style(self.colors.muted));
                        }
                    }
                }
            }
            Err(_) => println!("{}", output),
        }
    }

    fn print_data_export(&self, output: &str) {
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(output) {
            if let (Some(path), Some(tasks), Some(deps)) = (
                json.get("path").and_then(|v| v.as_str()),
                json.get("tasks").and_then(|v| v.as_u64()),
                json.get("dependencies").and_then(|v| v.as_u64()),
            ) {
                println!(
                    "Exported {} tasks and {} dependencies to {}",
                    tasks, deps, path
                );
                return;
            }
        }
        println!("{}", output);
    }

    fn print_data_import(&self, output: &str) {
        let Ok(json) = serde_json::from_str::<serde_json::Value>(output) else {
            println!("{}", output);
            return;
        };
        let tasks = json.get("tasks").and_then(|v| v.as_u64()).unwrap_or(0);
        let deps = json.get("dependencies").and_then(|v| v.as_u64()).unwrap_or(0);
        println!("Imported {} tasks and {} dependencies", tasks, deps);

        let rejected: Vec<RejectedDependency> = json
            .get("rejected")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        for r in &rejected {
            println!(
                "  {} {} -> {}: {}",
                "rejected".style(self.colors.blocked),
                self.fmt_id(&r.task_id),
                self.fmt_id(&r.depends_on_task_id),
                r.reason
            );
        }
    }
}
