use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{require, Team, ValidationError};

/// A team entered into one age group of a tournament.
///
/// The id is the team's client-generated id, so resubmitting the same
/// registration overwrites rather than duplicates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub age_group: String,
    pub team: Team,
}

impl Registration {
    pub fn new(tournament_id: Uuid, age_group: impl Into<String>, team: Team) -> Self {
        Self {
            id: team.id,
            tournament_id,
            age_group: age_group.into(),
            team,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id != self.team.id {
            return Err(ValidationError::IdMismatch {
                expected: self.team.id,
                found: self.id,
            });
        }
        require("ageGroup", &self.age_group)?;
        self.team.validate()
    }
}
