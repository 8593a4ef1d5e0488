//! Board commands: `taskboard boards` and `taskboard board ...`.

use anyhow::{Result, bail};
use console::{StyledObject, style};

use taskboard::board::models::{CreateBoardData, Priority, Task};
use taskboard::board::session::SessionEvent;
use taskboard::board::store::BoardStore;
use taskboard::board::view::BoardView;
use taskboard::board::ws::{self, ConnectionState};

use super::super::BoardCommands;
use super::App;

pub async fn cmd_boards(app: &App) -> Result<()> {
    app.require_login()?;
    let boards = app.board_store().fetch_boards().await?;
    if boards.is_empty() {
        println!("No boards.");
        return Ok(());
    }
    for board in boards {
        println!(
            "{}  {}  {}",
            style(&board.id).dim(),
            style(&board.name).bold(),
            board.description.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

pub async fn cmd_board(app: &App, command: BoardCommands) -> Result<()> {
    app.require_login()?;
    match command {
        BoardCommands::Show { board_id, json } => {
            let store = app.board_store();
            store.fetch_board(&board_id).await?;
            let Some(view) = current_view(&store) else {
                bail!("Board {} is not open", board_id);
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_board(&view);
            }
        }
        BoardCommands::Watch { board_id } => watch(app, &board_id).await?,
        BoardCommands::Create {
            name,
            team,
            description,
        } => {
            let board = app
                .board_store()
                .create_board(&CreateBoardData {
                    name,
                    description,
                    team_id: team,
                    columns: None,
                })
                .await?;
            println!("{} Created board {} ({})", style("✓").green(), board.name, board.id);
        }
        BoardCommands::Delete { board_id } => {
            app.board_store().delete_board(&board_id).await?;
            println!("Deleted board {}", board_id);
        }
    }
    Ok(())
}

/// Follow a board until Ctrl-C, redrawing on every change.
async fn watch(app: &App, board_id: &str) -> Result<()> {
    let token = app.require_login()?;
    let store = app.board_store();
    store.fetch_board(board_id).await?;
    if let Some(view) = current_view(&store) {
        print_board(&view);
    }

    let handle = ws::open(&app.config.push, &token, board_id, store.clone())?;
    let mut revisions = store.subscribe();
    let mut connection = handle.watch_state();
    let mut session_events = app.session.subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let outcome = loop {
        tokio::select! {
            _ = &mut ctrl_c => break Ok(()),
            changed = revisions.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                // A refetch bumps the revision twice; draw only the settled board.
                if store.is_loading() {
                    continue;
                }
                match current_view(&store) {
                    Some(view) => print_board(&view),
                    None => break Err(anyhow::anyhow!("Board {} was closed", board_id)),
                }
            }
            changed = connection.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let state = connection.borrow_and_update().clone();
                match state {
                    ConnectionState::Connecting => {}
                    ConnectionState::Connected => {
                        tracing::info!("Live updates connected for board {}", board_id);
                    }
                    ConnectionState::Reconnecting { attempt, delay } => {
                        tracing::warn!(
                            "Connection lost, reconnecting in {:?} (attempt {})",
                            delay,
                            attempt
                        );
                    }
                    ConnectionState::Down { error } => {
                        break Err(anyhow::anyhow!("Live updates unavailable: {}", error));
                    }
                    ConnectionState::Closed => break Ok(()),
                }
            }
            event = session_events.recv() => {
                if let Ok(SessionEvent::LoginRequired) = event {
                    break Err(anyhow::anyhow!("Session expired. Run 'taskboard login <token>' again."));
                }
            }
        }
    };

    handle.close().await;
    outcome
}

fn current_view(store: &BoardStore) -> Option<BoardView> {
    store.snapshot().map(|snapshot| BoardView::from_snapshot(&snapshot))
}

fn print_board(view: &BoardView) {
    println!();
    println!(
        "{} {}",
        style(&view.name).bold(),
        style(format!("({} tasks)", view.task_count())).dim()
    );
    for column in &view.columns {
        println!();
        println!(
            "{} {}",
            style(&column.column.name).cyan().bold(),
            style(format!("[{}]", column.tasks.len())).dim()
        );
        for task in &column.tasks {
            print_task(task);
        }
    }
    if !view.unplaced.is_empty() {
        println!();
        println!("{}", style("Other").yellow().bold());
        for task in &view.unplaced {
            print_task(task);
        }
    }
}

fn print_task(task: &Task) {
    let saving = if task.is_provisional() {
        style(" (saving)").dim().to_string()
    } else {
        String::new()
    };
    println!(
        "  {} {}{}  {}",
        priority_badge(task.priority),
        task.title,
        saving,
        style(&task.id).dim()
    );
}

fn priority_badge(priority: Priority) -> StyledObject<String> {
    let badge = style(format!("{:<8}", priority.as_str()));
    match priority {
        Priority::Low => badge.dim(),
        Priority::Medium => badge.blue(),
        Priority::High => badge.yellow(),
        Priority::Urgent => badge.red().bold(),
    }
}
