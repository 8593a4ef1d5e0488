//! Credential commands: `taskboard login`, `logout`, `whoami`.

use anyhow::Result;
use console::style;

use super::App;

pub async fn cmd_login(app: &App, token: &str) -> Result<()> {
    let user = app.auth().login(token.trim()).await?;
    println!(
        "{} Logged in as {} <{}>",
        style("✓").green(),
        style(&user.name).bold(),
        user.email
    );
    Ok(())
}

pub fn cmd_logout(app: &App) -> Result<()> {
    app.auth().logout();
    println!("Logged out.");
    Ok(())
}

pub async fn cmd_whoami(app: &App) -> Result<()> {
    let auth = app.auth();
    match auth.fetch_current_user().await? {
        Some(user) => {
            println!("{} <{}>", style(&user.name).bold(), user.email);
            println!("  id: {}", user.id);
            if !user.is_active {
                println!("  {}", style("account inactive").yellow());
            }
        }
        None => println!("Not logged in."),
    }
    Ok(())
}
