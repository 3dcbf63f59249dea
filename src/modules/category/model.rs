use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::modules::auth::interface::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "UPPERCASE")]
pub enum CategoryType {
    Income,
    Expense,
}

#[derive(Debug, Clone, FromRow)]
pub struct Category {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub icon: String,
    pub color: String,
    #[sqlx(rename = "type")]
    pub kind: CategoryType,
    pub created_at: DateTime<Utc>,
}

pub struct DefaultCategory {
    pub name: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
    pub kind: CategoryType,
}

/// Provisioned for every new account.
pub const DEFAULT_CATEGORIES: [DefaultCategory; 8] = [
    DefaultCategory { name: "Alimentation", icon: "🛒", color: "#10B981", kind: CategoryType::Expense },
    DefaultCategory { name: "Transport", icon: "🚗", color: "#3B82F6", kind: CategoryType::Expense },
    DefaultCategory { name: "Loisirs", icon: "🎬", color: "#8B5CF6", kind: CategoryType::Expense },
    DefaultCategory { name: "Restaurant", icon: "🍽️", color: "#F59E0B", kind: CategoryType::Expense },
    DefaultCategory { name: "Shopping", icon: "🛍️", color: "#EC4899", kind: CategoryType::Expense },
    DefaultCategory { name: "Santé", icon: "🏥", color: "#EF4444", kind: CategoryType::Expense },
    DefaultCategory { name: "Salaire", icon: "💰", color: "#10B981", kind: CategoryType::Income },
    DefaultCategory { name: "Freelance", icon: "💼", color: "#3B82F6", kind: CategoryType::Income },
];

pub fn default_categories_for(user_id: &str, now: DateTime<Utc>) -> Vec<Category> {
    DEFAULT_CATEGORIES
        .iter()
        .map(|c| Category {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: c.name.to_string(),
            icon: c.icon.to_string(),
            color: c.color.to_string(),
            kind: c.kind,
            created_at: now,
        })
        .collect()
}

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn create_batch(&self, categories: &[Category]) -> Result<()>;
}
