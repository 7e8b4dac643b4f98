//! Team registration: validate, write durably, then notify.

use std::sync::Arc;

use crate::context::SyncContext;
use crate::models::{Record, RecordChange, Registration, Team, Tournament, ValidationError};
use crate::notify::{Notice, Notifier, RegistrationDetails};
use crate::writer::{RetryingWriter, WriteError, WriteOutcome};

#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationOutcome {
    pub registration: Registration,
    pub write: WriteOutcome,
}

pub struct RegistrationService {
    writer: RetryingWriter,
    notifier: Arc<dyn Notifier>,
    admin_email: String,
}

impl RegistrationService {
    pub fn new(
        ctx: &SyncContext,
        notifier: Arc<dyn Notifier>,
        admin_email: impl Into<String>,
    ) -> Self {
        Self {
            writer: ctx.writer(),
            notifier,
            admin_email: admin_email.into(),
        }
    }

    /// The writer backing this form, for in-flight and retry indicators.
    pub fn writer(&self) -> &RetryingWriter {
        &self.writer
    }

    /// Registers `team` for `age_group` of `tournament`.
    ///
    /// Retries happen only inside the writer. Notices go out after the write
    /// succeeds (confirmed or saved locally) and their failures are logged.
    pub async fn register_team(
        &self,
        tournament: &Tournament,
        age_group: &str,
        team: Team,
    ) -> Result<RegistrationOutcome, WriteError> {
        if !tournament.offers_age_group(age_group) {
            return Err(ValidationError::UnknownAgeGroup(age_group.to_string()).into());
        }

        let registration = Registration::new(tournament.id, age_group, team);
        let write = self
            .writer
            .write_change(RecordChange::Upsert(Record::Registration(registration.clone())))
            .await?;

        tracing::info!(
            team = %registration.team.name,
            tournament = %tournament.title,
            attempts = write.attempts,
            confirmed = write.sync.is_confirmed(),
            "Team registered"
        );

        self.send_notices(tournament, &registration).await;

        Ok(RegistrationOutcome {
            registration,
            write,
        })
    }

    async fn send_notices(&self, tournament: &Tournament, registration: &Registration) {
        let details = RegistrationDetails::new(tournament, registration);
        let received = Notice::RegistrationReceived {
            to: self.admin_email.clone(),
            details: details.clone(),
        };
        let confirmed = Notice::RegistrationConfirmed {
            to: registration.team.email.clone(),
            details,
        };

        let (admin, coach) = futures::join!(
            self.notifier.notify(&received),
            self.notifier.notify(&confirmed)
        );
        for (notice, result) in [(&received, admin), (&confirmed, coach)] {
            if let Err(e) = result {
                tracing::warn!(to = notice.recipient(), "{}", e);
            }
        }
    }
}
