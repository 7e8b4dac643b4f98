use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{require, ValidationError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SponsorTier {
    Diamond,
    Gold,
    #[default]
    Silver,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Sponsor {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub tier: SponsorTier,
    #[serde(default)]
    pub logo: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub website: String,
}

impl Sponsor {
    pub fn new(name: impl Into<String>, tier: SponsorTier) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            tier,
            logo: String::new(),
            description: String::new(),
            website: String::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require("name", &self.name)?;
        let website = self.website.trim();
        if !website.is_empty()
            && !(website.starts_with("http://") || website.starts_with("https://"))
        {
            return Err(ValidationError::InvalidUrl(self.website.clone()));
        }
        Ok(())
    }
}
