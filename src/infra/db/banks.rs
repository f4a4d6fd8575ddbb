use async_trait::async_trait;
use uuid::Uuid;

use crate::application::repos::{BanksRepo, RepoError};

use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl BanksRepo for PostgresRepositories {
    async fn bank_exists(&self, id: Uuid) -> Result<bool, RepoError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM banks WHERE id = $1)")
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)
    }
}
