mod announcement;
mod pickup;
mod record;
mod registration;
mod result;
mod sponsor;
mod team;
mod tournament;

pub use announcement::{Announcement, Priority};
pub use pickup::PickUpPlayer;
pub use record::{Collection, Record, RecordChange, ValidationError};
pub use registration::Registration;
pub use result::{Division, ResultFormat, TournamentResult};
pub use sponsor::{Sponsor, SponsorTier};
pub use team::{PaymentStatus, SkillLevel, Team};
pub use tournament::{AgeGroupSpots, SportKind, Tournament};

/// Trimmed-empty check shared by the record validators.
pub(crate) fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(())
    }
}
