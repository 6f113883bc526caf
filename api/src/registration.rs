//! Registration submission and record management over a [`SolutionStore`].

use std::time::Duration;

use portal_core::scenarios::ScenarioCatalog;
use portal_core::solutions::{Solution, SubmissionForm, SubmitterRole, validate_submission};
use uuid::Uuid;

use crate::error::AppError;
use crate::store::{SolutionStore, bounded};

/// Store handle plus what every registration call needs alongside it.
#[derive(Clone, Copy)]
pub struct Registrar<'a> {
    pub store: &'a dyn SolutionStore,
    pub catalog: &'a ScenarioCatalog,
    pub timeout: Duration,
}

impl Registrar<'_> {
    /// `submit(form) -> Solution | ValidationError`. Nothing is written
    /// unless every constraint holds.
    pub async fn submit(
        &self,
        form: impl Into<SubmissionForm>,
        role: SubmitterRole,
    ) -> Result<Solution, AppError> {
        let payload = validate_submission(form.into(), self.catalog, role)
            .map_err(|issues| AppError::ValidationFailed { issues })?;

        let solution = bounded(self.timeout, self.store.insert(payload)).await?;
        tracing::info!(
            solution_id = %solution.id,
            turma = %solution.cohort,
            participants = solution.participants.len(),
            "solution registered"
        );
        Ok(solution)
    }

    pub async fn list(&self) -> Result<Vec<Solution>, AppError> {
        Ok(bounded(self.timeout, self.store.list_all()).await?)
    }

    /// Full replacement of a record's mutable fields. Validation runs before
    /// the id is looked up.
    pub async fn update(
        &self,
        id: Uuid,
        form: impl Into<SubmissionForm>,
        role: SubmitterRole,
    ) -> Result<Solution, AppError> {
        let payload = validate_submission(form.into(), self.catalog, role)
            .map_err(|issues| AppError::ValidationFailed { issues })?;

        let updated = bounded(self.timeout, self.store.update(id, payload))
            .await?
            .ok_or_else(|| AppError::NotFound {
                resource: format!("solution {id}"),
            })?;
        tracing::info!(solution_id = %id, "solution updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        if !bounded(self.timeout, self.store.delete(id)).await? {
            return Err(AppError::NotFound {
                resource: format!("solution {id}"),
            });
        }
        tracing::info!(solution_id = %id, "solution deleted");
        Ok(())
    }
}
