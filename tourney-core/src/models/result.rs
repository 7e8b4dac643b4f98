use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{require, SportKind, ValidationError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ResultFormat {
    Pool,
    RoundRobin,
    #[default]
    Bracket,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Division {
    #[default]
    Open,
    Gold,
    Silver,
}

/// Final standings posted for one age group of a finished tournament.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TournamentResult {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub tournament_title: String,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: SportKind,
    #[serde(default)]
    pub format: ResultFormat,
    pub age_group: String,
    #[serde(default)]
    pub division: Division,
    /// Team names in finishing order.
    #[serde(default)]
    pub teams: Vec<String>,
}

impl TournamentResult {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("tournamentTitle", &self.tournament_title)?;
        require("ageGroup", &self.age_group)?;
        for team in &self.teams {
            require("teams", team)?;
        }
        Ok(())
    }
}
