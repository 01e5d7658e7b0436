use async_trait::async_trait;
use uuid::Uuid;

use super::PgStore;
use crate::{models::identity::Identity, store::IdentityStore};

#[async_trait]
impl IdentityStore for PgStore {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Identity>> {
        let identity = sqlx::query_as::<_, Identity>("SELECT * FROM identities WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(identity)
    }
}
