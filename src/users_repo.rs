use anyhow::Result;
use diesel::prelude::*;
use uuid::Uuid;

use crate::users::{NewUser, User};
use crate::web::PgPool;

#[derive(Clone)]
pub struct UsersRepository {
    pool: PgPool,
}

impl UsersRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by ID
    pub async fn get_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        use crate::schema::users::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let user: Option<User> = dsl::users
                .filter(dsl::id.eq(user_id))
                .first::<User>(&mut conn)
                .optional()?;

            Ok::<Option<User>, anyhow::Error>(user)
        })
        .await??;

        Ok(result)
    }

    /// Create a new user (tests and fixtures; account creation is external)
    pub async fn create(&self, new_user: NewUser) -> Result<User> {
        use crate::schema::users::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let inserted: User = diesel::insert_into(dsl::users)
                .values(&new_user)
                .get_result(&mut conn)?;

            Ok::<User, anyhow::Error>(inserted)
        })
        .await??;

        Ok(result)
    }
}
