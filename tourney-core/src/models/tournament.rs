use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{require, ValidationError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SportKind {
    Baseball,
    Softball,
}

impl fmt::Display for SportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SportKind::Baseball => write!(f, "baseball"),
            SportKind::Softball => write!(f, "softball"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgeGroupSpots {
    pub age_group: String,
    pub spots: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tournament {
    pub id: Uuid,
    pub title: String,
    pub date: NaiveDate,
    pub location: String,
    pub spots_per_age_group: Vec<AgeGroupSpots>,
    pub entry_fee: String,
    #[serde(rename = "type")]
    pub kind: SportKind,
    #[serde(default)]
    pub image_url: String,
}

impl Tournament {
    pub fn new(
        title: impl Into<String>,
        date: NaiveDate,
        location: impl Into<String>,
        kind: SportKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            date,
            location: location.into(),
            spots_per_age_group: Vec::new(),
            entry_fee: String::new(),
            kind,
            image_url: String::new(),
        }
    }

    pub fn with_age_group(mut self, age_group: impl Into<String>, spots: u32) -> Self {
        self.spots_per_age_group.push(AgeGroupSpots {
            age_group: age_group.into(),
            spots,
        });
        self
    }

    pub fn with_entry_fee(mut self, entry_fee: impl Into<String>) -> Self {
        self.entry_fee = entry_fee.into();
        self
    }

    pub fn spots_for(&self, age_group: &str) -> Option<u32> {
        self.spots_per_age_group
            .iter()
            .find(|s| s.age_group == age_group)
            .map(|s| s.spots)
    }

    pub fn offers_age_group(&self, age_group: &str) -> bool {
        self.spots_for(age_group).is_some()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require("title", &self.title)?;
        require("location", &self.location)?;
        for spots in &self.spots_per_age_group {
            require("ageGroup", &spots.age_group)?;
        }
        Ok(())
    }
}
