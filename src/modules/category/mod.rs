pub mod crud;
pub mod memory;
pub mod model;

pub use model::{Category, CategoryRepository, CategoryType};
