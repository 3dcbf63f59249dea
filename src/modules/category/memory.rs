use async_trait::async_trait;
use tokio::sync::RwLock;

use super::model::{Category, CategoryRepository};
use crate::modules::auth::interface::Result;

#[derive(Default)]
pub struct MemoryCategoryStore {
    categories: RwLock<Vec<Category>>,
}

impl MemoryCategoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn for_user(&self, user_id: &str) -> Vec<Category> {
        self.categories
            .read()
            .await
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CategoryRepository for MemoryCategoryStore {
    async fn create_batch(&self, categories: &[Category]) -> Result<()> {
        self.categories.write().await.extend_from_slice(categories);
        Ok(())
    }
}
