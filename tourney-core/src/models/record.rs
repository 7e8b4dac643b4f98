//! Typed records and the collections they live in.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use super::{Announcement, PickUpPlayer, Registration, Sponsor, Tournament, TournamentResult};

/// Errors raised when a record fails boundary validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Invalid URL (must start with http:// or https://): {0}")]
    InvalidUrl(String),

    #[error("Tournament does not offer age group '{0}'")]
    UnknownAgeGroup(String),

    #[error("Record id {found} does not match expected id {expected}")]
    IdMismatch { expected: Uuid, found: Uuid },

    #[error("Malformed {collection} record: {message}")]
    Malformed {
        collection: Collection,
        message: String,
    },
}

/// Remote collections the application writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Collection {
    #[serde(rename = "tournaments")]
    Tournaments,
    #[serde(rename = "registeredTeams")]
    RegisteredTeams,
    #[serde(rename = "sponsors")]
    Sponsors,
    #[serde(rename = "announcements")]
    Announcements,
    #[serde(rename = "results")]
    Results,
    #[serde(rename = "pickUpPlayers")]
    PickUpPlayers,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Tournaments,
        Collection::RegisteredTeams,
        Collection::Sponsors,
        Collection::Announcements,
        Collection::Results,
        Collection::PickUpPlayers,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Tournaments => "tournaments",
            Collection::RegisteredTeams => "registeredTeams",
            Collection::Sponsors => "sponsors",
            Collection::Announcements => "announcements",
            Collection::Results => "results",
            Collection::PickUpPlayers => "pickUpPlayers",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == s)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One record of any collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "collection", content = "record")]
pub enum Record {
    #[serde(rename = "tournaments")]
    Tournament(Tournament),
    #[serde(rename = "registeredTeams")]
    Registration(Registration),
    #[serde(rename = "sponsors")]
    Sponsor(Sponsor),
    #[serde(rename = "announcements")]
    Announcement(Announcement),
    #[serde(rename = "results")]
    Result(TournamentResult),
    #[serde(rename = "pickUpPlayers")]
    PickUpPlayer(PickUpPlayer),
}

impl Record {
    pub fn collection(&self) -> Collection {
        match self {
            Record::Tournament(_) => Collection::Tournaments,
            Record::Registration(_) => Collection::RegisteredTeams,
            Record::Sponsor(_) => Collection::Sponsors,
            Record::Announcement(_) => Collection::Announcements,
            Record::Result(_) => Collection::Results,
            Record::PickUpPlayer(_) => Collection::PickUpPlayers,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Record::Tournament(r) => r.id,
            Record::Registration(r) => r.id,
            Record::Sponsor(r) => r.id,
            Record::Announcement(r) => r.id,
            Record::Result(r) => r.id,
            Record::PickUpPlayer(r) => r.id,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Record::Tournament(r) => r.validate(),
            Record::Registration(r) => r.validate(),
            Record::Sponsor(r) => r.validate(),
            Record::Announcement(r) => r.validate(),
            Record::Result(r) => r.validate(),
            Record::PickUpPlayer(r) => r.validate(),
        }
    }

    /// The record body as stored remotely, without the collection tag.
    pub fn to_document(&self) -> Result<Value, serde_json::Error> {
        match self {
            Record::Tournament(r) => serde_json::to_value(r),
            Record::Registration(r) => serde_json::to_value(r),
            Record::Sponsor(r) => serde_json::to_value(r),
            Record::Announcement(r) => serde_json::to_value(r),
            Record::Result(r) => serde_json::to_value(r),
            Record::PickUpPlayer(r) => serde_json::to_value(r),
        }
    }

    /// Parses and validates a stored document of the given collection.
    pub fn from_document(collection: Collection, document: Value) -> Result<Self, ValidationError> {
        let malformed = |e: serde_json::Error| ValidationError::Malformed {
            collection,
            message: e.to_string(),
        };
        let record = match collection {
            Collection::Tournaments => {
                Record::Tournament(serde_json::from_value(document).map_err(malformed)?)
            }
            Collection::RegisteredTeams => {
                Record::Registration(serde_json::from_value(document).map_err(malformed)?)
            }
            Collection::Sponsors => {
                Record::Sponsor(serde_json::from_value(document).map_err(malformed)?)
            }
            Collection::Announcements => {
                Record::Announcement(serde_json::from_value(document).map_err(malformed)?)
            }
            Collection::Results => {
                Record::Result(serde_json::from_value(document).map_err(malformed)?)
            }
            Collection::PickUpPlayers => {
                Record::PickUpPlayer(serde_json::from_value(document).map_err(malformed)?)
            }
        };
        record.validate()?;
        Ok(record)
    }
}

/// A single form submission: create or edit a record, or delete one.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordChange {
    Upsert(Record),
    Delete { collection: Collection, id: Uuid },
}

impl RecordChange {
    pub fn collection(&self) -> Collection {
        match self {
            RecordChange::Upsert(record) => record.collection(),
            RecordChange::Delete { collection, .. } => *collection,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            RecordChange::Upsert(record) => record.id(),
            RecordChange::Delete { id, .. } => *id,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            RecordChange::Upsert(record) => record.validate(),
            RecordChange::Delete { .. } => Ok(()),
        }
    }
}
