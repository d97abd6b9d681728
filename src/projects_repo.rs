use anyhow::Result;
use diesel::prelude::*;
use uuid::Uuid;

use crate::projects::{NewProject, Project};
use crate::web::PgPool;

#[derive(Clone)]
pub struct ProjectsRepository {
    pool: PgPool,
}

impl ProjectsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a project by ID
    pub async fn get_by_id(&self, project_id: Uuid) -> Result<Option<Project>> {
        use crate::schema::projects::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let project: Option<Project> = dsl::projects
                .filter(dsl::id.eq(project_id))
                .first::<Project>(&mut conn)
                .optional()?;

            Ok::<Option<Project>, anyhow::Error>(project)
        })
        .await??;

        Ok(result)
    }

    /// Create a new project
    pub async fn create(&self, new_project: NewProject) -> Result<Project> {
        use crate::schema::projects::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let inserted: Project = diesel::insert_into(dsl::projects)
                .values(&new_project)
                .get_result(&mut conn)?;

            Ok::<Project, anyhow::Error>(inserted)
        })
        .await??;

        Ok(result)
    }
}
