use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tourney::config::Config;
use tourney_core::{LogNotifier, RegistrationService, SkillLevel, Team, Tournament};

use super::{connect, print_outcome};

/// Register a team for a tournament age group
#[derive(Args)]
pub struct RegisterCommand {
    /// Tournament JSON file
    #[arg(long, short)]
    tournament: PathBuf,

    /// Age group to register for (e.g. "10U")
    #[arg(long, short)]
    age_group: String,

    /// Team name
    #[arg(long)]
    team_name: String,

    /// Coach name
    #[arg(long)]
    coach: String,

    /// Coach email
    #[arg(long)]
    email: String,

    /// Coach phone
    #[arg(long)]
    phone: String,

    /// Skill level (A, B or C)
    #[arg(long, default_value = "A")]
    skill: SkillLevel,

    /// Notes for the organisers
    #[arg(long)]
    notes: Option<String>,
}

impl RegisterCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let tournament = load_tournament(&self.tournament)?;

        let mut team = Team::new(&self.team_name, &self.coach, &self.email, &self.phone)
            .with_skill_level(self.skill);
        if let Some(notes) = &self.notes {
            team = team.with_notes(notes);
        }

        let session = connect(config).await?;
        let service = RegistrationService::new(
            &session.ctx,
            Arc::new(LogNotifier),
            config.admin_email.value.clone(),
        );

        let outcome = service
            .register_team(&tournament, &self.age_group, team)
            .await?;

        print_outcome(
            &format!(
                "Registered {} for {} ({})",
                outcome.registration.team.name, tournament.title, outcome.registration.age_group
            ),
            &outcome.write,
        );
        println!("  Registration ID: {}", outcome.registration.id);
        Ok(())
    }
}

fn load_tournament(path: &Path) -> Result<Tournament, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let tournament: Tournament = serde_json::from_str(&contents)
        .map_err(|e| format!("Invalid tournament file {}: {}", path.display(), e))?;
    tournament.validate()?;
    Ok(tournament)
}
