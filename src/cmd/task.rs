//! Task commands: `taskboard task create|update|move|delete`.
//!
//! Each command opens the board first so the change is applied
//! optimistically and reconciled like any other client would.

use anyhow::{Context, Result};
use console::style;

use taskboard::board::models::{CreateTaskData, Priority, TaskType, UpdateTaskData};
use taskboard::board::tasks::TaskOrchestrator;

use super::super::TaskCommands;
use super::App;

pub async fn cmd_task(app: &App, command: TaskCommands) -> Result<()> {
    app.require_login()?;
    let tasks = app.tasks();

    match command {
        TaskCommands::Create {
            board_id,
            title,
            column,
            priority,
            task_type,
            description,
            tags,
        } => {
            open(&tasks, &board_id).await?;
            let data = CreateTaskData {
                title,
                description,
                priority: priority.as_deref().map(parse_priority).transpose()?,
                task_type: task_type
                    .as_deref()
                    .map(|t| t.parse::<TaskType>().map_err(anyhow::Error::msg))
                    .transpose()?,
                board_id,
                tags: (!tags.is_empty()).then_some(tags),
                column_id: column,
                ..Default::default()
            };
            let task = tasks.create_task(data).await?;
            println!(
                "{} Created {} in {} ({})",
                style("✓").green(),
                style(&task.title).bold(),
                task.column_id,
                task.id
            );
        }
        TaskCommands::Update {
            board_id,
            task_id,
            title,
            description,
            priority,
            status,
            assignee,
        } => {
            open(&tasks, &board_id).await?;
            let data = UpdateTaskData {
                title,
                description,
                priority: priority.as_deref().map(parse_priority).transpose()?,
                status,
                assignee_id: assignee,
                ..Default::default()
            };
            let task = tasks.update_task(&task_id, data).await?;
            println!("{} Updated {} ({})", style("✓").green(), task.title, task.id);
        }
        TaskCommands::Move {
            board_id,
            task_id,
            column,
            index,
        } => {
            open(&tasks, &board_id).await?;
            let snapshot = tasks
                .store()
                .snapshot()
                .with_context(|| format!("Board {} is not open", board_id))?;
            let source = snapshot
                .task(&task_id)
                .map(|t| t.column_id.clone())
                .with_context(|| format!("Task {} is not on board {}", task_id, board_id))?;
            let index = index.unwrap_or_else(|| snapshot.column_len(&column));
            let task = tasks.move_task(&task_id, &source, &column, index).await?;
            println!(
                "{} Moved {} to {} at {}",
                style("✓").green(),
                task.title,
                task.column_id,
                task.position
            );
        }
        TaskCommands::Delete { board_id, task_id } => {
            open(&tasks, &board_id).await?;
            tasks.delete_task(&task_id).await?;
            println!("Deleted task {}", task_id);
        }
    }
    Ok(())
}

async fn open(tasks: &TaskOrchestrator, board_id: &str) -> Result<()> {
    tasks
        .store()
        .fetch_board(board_id)
        .await
        .with_context(|| format!("Failed to open board {}", board_id))
}

fn parse_priority(value: &str) -> Result<Priority> {
    value.parse::<Priority>().map_err(anyhow::Error::msg)
}
