//! Team and sprint commands.

use anyhow::Result;
use console::style;

use taskboard::board::gateway::BoardGateway as _;
use taskboard::board::models::{
    AddTeamMemberData, CreateTeamData, TeamRole, TeamWithMembers, UpdateTeamMemberData,
};

use super::super::TeamCommands;
use super::App;

pub async fn cmd_team(app: &App, command: TeamCommands) -> Result<()> {
    app.require_login()?;
    let teams = app.teams();

    match command {
        TeamCommands::List => {
            let list = teams.fetch_teams().await?;
            if list.is_empty() {
                println!("No teams.");
            }
            for team in list {
                println!("{}  {}", style(&team.id).dim(), style(&team.name).bold());
            }
        }
        TeamCommands::Show { team_id } => {
            let team = teams.fetch_team(&team_id).await?;
            print_team(&team);
        }
        TeamCommands::Create { name, description } => {
            let team = teams
                .create_team(&CreateTeamData { name, description })
                .await?;
            println!("{} Created team {} ({})", style("✓").green(), team.name, team.id);
        }
        TeamCommands::AddMember {
            team_id,
            email,
            role,
        } => {
            let role = role.as_deref().map(parse_role).transpose()?;
            teams
                .add_team_member(
                    &team_id,
                    &AddTeamMemberData {
                        user_email: email.clone(),
                        role,
                    },
                )
                .await?;
            println!("{} Added {} to {}", style("✓").green(), email, team_id);
            if let Some(team) = teams.current_team() {
                print_team(&team);
            }
        }
        TeamCommands::SetRole {
            team_id,
            user_id,
            role,
        } => {
            let role = parse_role(&role)?;
            teams
                .update_team_member(&team_id, &user_id, &UpdateTeamMemberData { role })
                .await?;
            println!("{} {} is now {}", style("✓").green(), user_id, role.as_str());
        }
        TeamCommands::RemoveMember { team_id, user_id } => {
            teams.remove_team_member(&team_id, &user_id).await?;
            println!("Removed {} from {}", user_id, team_id);
        }
    }
    Ok(())
}

pub async fn cmd_sprints(app: &App, team_id: Option<&str>) -> Result<()> {
    app.require_login()?;
    let sprints = app.gateway.list_sprints(team_id).await?;
    if sprints.is_empty() {
        println!("No sprints.");
    }
    for sprint in sprints {
        let marker = if sprint.is_active {
            style("active").green().to_string()
        } else {
            String::new()
        };
        println!(
            "{}  {}  {} → {}  {}",
            style(&sprint.id).dim(),
            style(&sprint.name).bold(),
            sprint.start_date,
            sprint.end_date,
            marker
        );
    }
    Ok(())
}

fn print_team(team: &TeamWithMembers) {
    println!(
        "{} {}",
        style(&team.team.name).bold(),
        style(format!("({} members)", team.member_count)).dim()
    );
    for member in &team.members {
        println!(
            "  {:<8} {} <{}>  {}",
            member.role.as_str(),
            member.user.name,
            member.user.email,
            style(&member.user.id).dim()
        );
    }
}

fn parse_role(value: &str) -> Result<TeamRole> {
    value.parse::<TeamRole>().map_err(anyhow::Error::msg)
}
