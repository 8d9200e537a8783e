pub mod duckdb;
pub mod types;

pub use self::duckdb::{Store, StoreError};
