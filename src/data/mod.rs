//! Input tables: column roles and delimited-text loading

mod loader;
mod schema;

pub use loader::DataLoader;
pub use schema::{ChurnSchema, ColumnRole};
