use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use portal_core::scenarios::Cohort;
use portal_core::solutions::{
    DescriptionBlock, ImageReference, Participant, Solution, SolutionPayload,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stored solution {id} is malformed: {reason}")]
    Corrupt { id: Uuid, reason: String },
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
}

/// Durable table of submitted solutions. Mutations are single-row and atomic;
/// there is no partial-field update.
#[async_trait]
pub trait SolutionStore: Send + Sync {
    /// Insert a new record; the store assigns id and submission timestamp.
    async fn insert(&self, payload: SolutionPayload) -> Result<Solution, StoreError>;

    /// Every record, newest submission first.
    async fn list_all(&self) -> Result<Vec<Solution>, StoreError>;

    /// Replace the full mutable field set. `None` when the id is unknown.
    async fn update(
        &self,
        id: Uuid,
        payload: SolutionPayload,
    ) -> Result<Option<Solution>, StoreError>;

    /// `false` when the id is unknown.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Cheap reachability check for `/health`.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Run a store call with an upper bound on how long it may take.
pub async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| StoreError::Timeout(limit))?
}

// --- PostgreSQL ---

pub struct PgSolutionStore {
    pool: PgPool,
}

impl PgSolutionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for sqlx mapping
#[derive(sqlx::FromRow)]
struct SolutionRow {
    id: Uuid,
    nome_da_solucao: String,
    turma: String,
    participantes: Json<Vec<Participant>>,
    cenarios_relacionados: Vec<String>,
    descricao_refinada: Json<DescriptionBlock>,
    imagem: Json<ImageReference>,
    link_solucao: Option<String>,
    data_submissao: DateTime<Utc>,
}

impl SolutionRow {
    fn into_solution(self) -> Result<Solution, StoreError> {
        let cohort: Cohort = self.turma.parse().map_err(|e: portal_core::scenarios::UnknownCohort| {
            StoreError::Corrupt {
                id: self.id,
                reason: e.to_string(),
            }
        })?;
        Ok(Solution {
            id: self.id,
            solution_name: self.nome_da_solucao,
            cohort,
            participants: self.participantes.0,
            scenario_ids: self.cenarios_relacionados,
            description: self.descricao_refinada.0,
            image: self.imagem.0,
            link: self.link_solucao,
            submitted_at: self.data_submissao,
        })
    }
}

const SOLUTION_COLUMNS: &str = "id, nome_da_solucao, turma, participantes, cenarios_relacionados, \
     descricao_refinada, imagem, link_solucao, data_submissao";

#[async_trait]
impl SolutionStore for PgSolutionStore {
    async fn insert(&self, payload: SolutionPayload) -> Result<Solution, StoreError> {
        let id = Uuid::now_v7();
        let row = sqlx::query_as::<_, SolutionRow>(&format!(
            r#"
            INSERT INTO solutions
                (id, nome_da_solucao, turma, participantes, cenarios_relacionados,
                 descricao_refinada, imagem, link_solucao)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {SOLUTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&payload.solution_name)
        .bind(payload.cohort.as_str())
        .bind(Json(&payload.participants))
        .bind(&payload.scenario_ids)
        .bind(Json(&payload.description))
        .bind(Json(&payload.image))
        .bind(&payload.link)
        .fetch_one(&self.pool)
        .await?;

        row.into_solution()
    }

    async fn list_all(&self) -> Result<Vec<Solution>, StoreError> {
        let rows = sqlx::query_as::<_, SolutionRow>(&format!(
            "SELECT {SOLUTION_COLUMNS} FROM solutions ORDER BY data_submissao DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SolutionRow::into_solution).collect()
    }

    async fn update(
        &self,
        id: Uuid,
        payload: SolutionPayload,
    ) -> Result<Option<Solution>, StoreError> {
        let row = sqlx::query_as::<_, SolutionRow>(&format!(
            r#"
            UPDATE solutions
            SET nome_da_solucao = $2,
                turma = $3,
                participantes = $4,
                cenarios_relacionados = $5,
                descricao_refinada = $6,
                imagem = $7,
                link_solucao = $8
            WHERE id = $1
            RETURNING {SOLUTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&payload.solution_name)
        .bind(payload.cohort.as_str())
        .bind(Json(&payload.participants))
        .bind(&payload.scenario_ids)
        .bind(Json(&payload.description))
        .bind(Json(&payload.image))
        .bind(&payload.link)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SolutionRow::into_solution).transpose()
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM solutions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}

// --- In-memory ---

#[derive(Default)]
struct MemoryState {
    rows: Vec<Solution>,
    last_submitted_at: Option<DateTime<Utc>>,
}

/// Process-local store with the same contract as the database table.
/// Used by tests and by `PORTAL_STORE=memory` for local demos.
#[derive(Default)]
pub struct MemorySolutionStore {
    state: Mutex<MemoryState>,
}

impl MemorySolutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).rows.len()
    }
}

#[async_trait]
impl SolutionStore for MemorySolutionStore {
    async fn insert(&self, payload: SolutionPayload) -> Result<Solution, StoreError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        // Wall clocks can step backwards; submission times must not.
        let now = Utc::now();
        let submitted_at = match state.last_submitted_at {
            Some(last) if last > now => last,
            _ => now,
        };
        state.last_submitted_at = Some(submitted_at);

        let solution = Solution::from_payload(Uuid::now_v7(), submitted_at, payload);
        state.rows.push(solution.clone());
        Ok(solution)
    }

    async fn list_all(&self) -> Result<Vec<Solution>, StoreError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let mut rows = state.rows.clone();
        rows.sort_by(|a, b| {
            b.submitted_at
                .cmp(&a.submitted_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(rows)
    }

    async fn update(
        &self,
        id: Uuid,
        payload: SolutionPayload,
    ) -> Result<Option<Solution>, StoreError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let Some(row) = state.rows.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        *row = Solution::from_payload(row.id, row.submitted_at, payload);
        Ok(Some(row.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let before = state.rows.len();
        state.rows.retain(|s| s.id != id);
        Ok(state.rows.len() < before)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
