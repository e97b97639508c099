//! Durable storage for [`StakeOperation`](stakeflow_primitives::operation::StakeOperation)
//! records, so an interrupted saga can be resumed from its last completed phase.

pub mod errors;
pub mod inmemory;
pub mod operations;
pub mod persistent;

pub use errors::{DbError, DbResult};
pub use inmemory::InMemoryOperationDb;
pub use operations::OperationDb;
pub use persistent::{config::DbConfig, sqlite::SqliteOperationDb};
