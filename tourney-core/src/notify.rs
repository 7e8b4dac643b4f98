//! Outbound notices. Delivery is someone else's job; failures never undo a
//! write that already succeeded.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::models::{Registration, SkillLevel, Tournament};

#[derive(Debug, Error)]
#[error("Notification failed: {0}")]
pub struct NotifyError(pub String);

/// Everything the registration notices mention.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrationDetails {
    pub tournament_title: String,
    pub tournament_date: NaiveDate,
    pub tournament_location: String,
    pub entry_fee: String,
    pub age_group: String,
    pub team_name: String,
    pub coach_name: String,
    pub email: String,
    pub phone: String,
    pub skill_level: SkillLevel,
}

impl RegistrationDetails {
    pub fn new(tournament: &Tournament, registration: &Registration) -> Self {
        let team = &registration.team;
        Self {
            tournament_title: tournament.title.clone(),
            tournament_date: tournament.date,
            tournament_location: tournament.location.clone(),
            entry_fee: tournament.entry_fee.clone(),
            age_group: registration.age_group.clone(),
            team_name: team.name.clone(),
            coach_name: team.coach_name.clone(),
            email: team.email.clone(),
            phone: team.phone.clone(),
            skill_level: team.skill_level,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// Sent to the organisers.
    RegistrationReceived {
        to: String,
        details: RegistrationDetails,
    },
    /// Sent to the registering coach.
    RegistrationConfirmed {
        to: String,
        details: RegistrationDetails,
    },
}

impl Notice {
    pub fn recipient(&self) -> &str {
        match self {
            Notice::RegistrationReceived { to, .. }
            | Notice::RegistrationConfirmed { to, .. } => to,
        }
    }

    pub fn subject(&self) -> String {
        match self {
            Notice::RegistrationReceived { details, .. } => format!(
                "New registration: {} ({}) for {}",
                details.team_name, details.age_group, details.tournament_title
            ),
            Notice::RegistrationConfirmed { details, .. } => {
                format!("Registration confirmed: {}", details.tournament_title)
            }
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: &Notice) -> Result<(), NotifyError>;
}

/// Writes notices to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notice: &Notice) -> Result<(), NotifyError> {
        tracing::info!(to = notice.recipient(), "Notice: {}", notice.subject());
        Ok(())
    }
}
