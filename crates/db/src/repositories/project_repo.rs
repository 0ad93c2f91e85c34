//! Repository for the `projects` table.

use simdesk_core::types::{DbId, Hours};
use sqlx::{PgConnection, PgPool};

use crate::models::project::{CreateProject, Project, UpdateProject};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str =
    "id, name, description, status_id, total_hours, used_hours, created_at, updated_at";

/// Provides CRUD operations for projects, plus the locked reads and budget
/// writes used by the hour ledger.
pub struct ProjectRepo;

impl ProjectRepo {
    /// Insert a new project, returning the created row.
    ///
    /// If `status` is `None` in the input, defaults to 1 (Draft). `used_hours`
    /// always starts at 0.
    pub async fn create(pool: &PgPool, input: &CreateProject) -> Result<Project, sqlx::Error> {
        let query = format!(
            "INSERT INTO projects (name, description, status_id, total_hours)
             VALUES ($1, $2, COALESCE($3, 1), COALESCE($4, 0))
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(&input.name)
            .bind(&input.description)
            .bind(input.status.map(|s| s.id()))
            .bind(input.total_hours)
            .fetch_one(pool)
            .await
    }

    /// Find a project by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Project>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects WHERE id = $1");
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all projects ordered by most recently created first.
    pub async fn list(pool: &PgPool) -> Result<Vec<Project>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects ORDER BY created_at DESC, id DESC");
        sqlx::query_as::<_, Project>(&query).fetch_all(pool).await
    }

    /// Update a project. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateProject,
    ) -> Result<Option<Project>, sqlx::Error> {
        let query = format!(
            "UPDATE projects SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                status_id = COALESCE($4, status_id),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(&input.description)
            .bind(input.status.map(|s| s.id()))
            .fetch_optional(pool)
            .await
    }

    // ── Ledger support (caller holds a transaction) ─────────────────

    /// Read a project and take an exclusive row lock on it.
    ///
    /// The lock is held until the surrounding transaction ends, so every
    /// other ledger writer for the same project waits here.
    pub async fn find_for_update(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<Project>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
    }

    /// Overwrite `used_hours` and bump `updated_at`.
    pub async fn set_used_hours(
        conn: &mut PgConnection,
        id: DbId,
        used_hours: Hours,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE projects SET used_hours = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(used_hours)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Overwrite `total_hours` and bump `updated_at`.
    pub async fn set_total_hours(
        conn: &mut PgConnection,
        id: DbId,
        total_hours: Hours,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE projects SET total_hours = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(total_hours)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}
