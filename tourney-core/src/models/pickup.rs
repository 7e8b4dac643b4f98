use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::team::is_plausible_email;
use super::{require, SkillLevel, ValidationError};

/// A player without a team, listed so coaches can pick them up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PickUpPlayer {
    pub id: Uuid,
    pub player_name: String,
    /// Age group label such as "12U".
    pub age: String,
    pub position: String,
    #[serde(default)]
    pub experience: SkillLevel,
    #[serde(default)]
    pub availability: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub date_posted: DateTime<Utc>,
}

impl PickUpPlayer {
    pub fn new(
        player_name: impl Into<String>,
        age: impl Into<String>,
        position: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            player_name: player_name.into(),
            age: age.into(),
            position: position.into(),
            experience: SkillLevel::default(),
            availability: String::new(),
            email: email.into(),
            phone: None,
            date_posted: Utc::now(),
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require("playerName", &self.player_name)?;
        require("age", &self.age)?;
        require("position", &self.position)?;
        if !is_plausible_email(&self.email) {
            return Err(ValidationError::InvalidEmail(self.email.clone()));
        }
        Ok(())
    }
}
