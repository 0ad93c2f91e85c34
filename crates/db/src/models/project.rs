//! Project entity model and DTOs.

use serde::{Deserialize, Serialize};
use simdesk_core::hours::BudgetSnapshot;
use simdesk_core::status::ProjectStatus;
use simdesk_core::types::{DbId, Hours, Timestamp};
use sqlx::FromRow;

/// A project row from the `projects` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    #[sqlx(rename = "status_id", try_from = "i16")]
    pub status: ProjectStatus,
    pub total_hours: Hours,
    pub used_hours: Hours,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Project {
    /// The hour-budget fields the ledger decides on.
    pub fn budget(&self) -> BudgetSnapshot {
        BudgetSnapshot {
            total_hours: self.total_hours,
            used_hours: self.used_hours,
            status: self.status,
        }
    }

    /// Hours not yet allocated.
    pub fn available_hours(&self) -> Hours {
        self.total_hours - self.used_hours
    }
}

/// DTO for creating a new project.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProject {
    pub name: String,
    pub description: Option<String>,
    /// Defaults to `draft` if omitted.
    pub status: Option<ProjectStatus>,
    /// Initial hour budget. Defaults to 0; grown later through extensions.
    pub total_hours: Option<Hours>,
}

/// DTO for updating an existing project. All fields are optional.
///
/// Hour columns are deliberately absent: they move only through the ledger.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
}
