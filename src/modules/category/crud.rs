use async_trait::async_trait;

use super::model::{Category, CategoryRepository};
use crate::config::DbPool;
use crate::modules::auth::interface::Result;

pub struct CategoryCrud {
    pool: DbPool,
}

impl CategoryCrud {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CategoryRepository for CategoryCrud {
    async fn create_batch(&self, categories: &[Category]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for category in categories {
            sqlx::query(
                r#"
                INSERT INTO categories (id, user_id, name, icon, color, type, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&category.id)
            .bind(&category.user_id)
            .bind(&category.name)
            .bind(&category.icon)
            .bind(&category.color)
            .bind(category.kind)
            .bind(category.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
