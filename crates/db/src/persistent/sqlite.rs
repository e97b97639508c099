//! SQLite implementation of the persistent storage layer.

use std::{future::Future, path::Path};

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};
use stakeflow_primitives::operation::{OperationKey, StakeOperation};
use tracing::{info, warn};

use super::{config::DbConfig, errors::StorageError};
use crate::{errors::DbResult, operations::OperationDb};

/// SQLite result codes that mean another connection holds the lock.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// [`OperationDb`] backed by a SQLite pool.
///
/// Each operation is stored as a JSON record next to its key, phase and broadcast claim, so pending
/// operations can be listed and claims checked without decoding every row.
#[derive(Debug, Clone)]
pub struct SqliteOperationDb {
    pool: SqlitePool,
    config: DbConfig,
}

impl SqliteOperationDb {
    /// Wraps an existing pool. The schema must already be migrated, see [`Self::migrate`].
    pub fn new(pool: SqlitePool, config: DbConfig) -> Self {
        Self { pool, config }
    }

    /// Opens (creating if missing) the database file at `path` and applies the migrations.
    pub async fn open(path: impl AsRef<Path>, config: DbConfig) -> DbResult<Self> {
        let connect_options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .connect_with(connect_options)
            .await
            .map_err(StorageError::from)?;

        info!(action = "running migrations", path = %path.as_ref().display());
        Self::migrate(&pool).await?;

        Ok(Self::new(pool, config))
    }

    /// Applies the schema migrations bundled with this crate.
    pub async fn migrate(pool: &SqlitePool) -> DbResult<()> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }

    /// Runs `query`, retrying while SQLite reports the database as busy.
    async fn with_retries<T, F, Fut>(&self, action: &'static str, mut query: F) -> DbResult<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        let mut attempt = 0;
        loop {
            match query().await {
                Ok(value) => return Ok(value),
                Err(e) if is_busy(&e) && attempt < self.config.max_retry_count() => {
                    attempt += 1;
                    warn!(%action, %attempt, "database busy, retrying");
                    tokio::time::sleep(self.config.backoff_period()).await;
                }
                Err(e) => return Err(StorageError::from(e).into()),
            }
        }
    }
}

fn is_busy(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db_error) => db_error
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .is_some_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED)),
        _ => false,
    }
}

fn decode_record(record: &str) -> DbResult<StakeOperation> {
    serde_json::from_str(record)
        .map_err(|e| StorageError::InvalidData(format!("stake operation record: {e}")).into())
}

fn decode_records(records: Vec<String>) -> DbResult<Vec<StakeOperation>> {
    records.iter().map(|record| decode_record(record)).collect()
}

fn encode_record(operation: &StakeOperation) -> DbResult<String> {
    serde_json::to_string(operation)
        .map_err(|e| StorageError::InvalidData(format!("stake operation record: {e}")).into())
}

/// Unix times are far below `i64::MAX`; saturate rather than wrap if that ever changes.
fn unix_time(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX)
}

impl OperationDb for SqliteOperationDb {
    async fn get_operation(&self, key: OperationKey) -> DbResult<Option<StakeOperation>> {
        let pool = &self.pool;
        let key = key.to_string();

        let record = self
            .with_retries("get operation", move || {
                sqlx::query_scalar::<_, String>(
                    "SELECT record FROM stake_operations WHERE op_key = ?1",
                )
                .bind(key.clone())
                .fetch_optional(pool)
            })
            .await?;

        record.as_deref().map(decode_record).transpose()
    }

    async fn put_operation(&self, operation: &StakeOperation) -> DbResult<()> {
        let pool = &self.pool;
        let key = operation.key.to_string();
        let kind = operation.kind.to_string();
        let phase = operation.phase.to_string();
        let record = encode_record(operation)?;
        let claimed_at = operation.claimed_at.map(unix_time);

        self.with_retries("put operation", move || {
            sqlx::query(
                "INSERT INTO stake_operations (op_key, kind, phase, record, claimed_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT (op_key) DO UPDATE SET
                        kind = excluded.kind,
                        phase = excluded.phase,
                        record = excluded.record,
                        claimed_at = excluded.claimed_at",
            )
            .bind(key.clone())
            .bind(kind.clone())
            .bind(phase.clone())
            .bind(record.clone())
            .bind(claimed_at)
            .execute(pool)
        })
        .await?;

        Ok(())
    }

    async fn claim_operation(
        &self,
        operation: &StakeOperation,
        stale_before: u64,
    ) -> DbResult<bool> {
        let pool = &self.pool;
        let key = operation.key.to_string();
        let kind = operation.kind.to_string();
        let phase = operation.phase.to_string();
        let record = encode_record(operation)?;
        let claimed_at = operation.claimed_at.map(unix_time);
        let stale_before = unix_time(stale_before);

        // a NULL claim never compares below the cutoff, so broadcast records are kept
        let result = self
            .with_retries("claim operation", move || {
                sqlx::query(
                    "INSERT INTO stake_operations (op_key, kind, phase, record, claimed_at)
                        VALUES (?1, ?2, ?3, ?4, ?5)
                        ON CONFLICT (op_key) DO UPDATE SET
                            kind = excluded.kind,
                            phase = excluded.phase,
                            record = excluded.record,
                            claimed_at = excluded.claimed_at
                        WHERE stake_operations.phase IN ('Completed', 'Failed')
                            OR stake_operations.claimed_at < ?6",
                )
                .bind(key.clone())
                .bind(kind.clone())
                .bind(phase.clone())
                .bind(record.clone())
                .bind(claimed_at)
                .bind(stale_before)
                .execute(pool)
            })
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_operations(&self) -> DbResult<Vec<StakeOperation>> {
        let pool = &self.pool;

        let records = self
            .with_retries("list operations", move || {
                sqlx::query_scalar::<_, String>(
                    "SELECT record FROM stake_operations ORDER BY op_key",
                )
                .fetch_all(pool)
            })
            .await?;

        let mut operations = decode_records(records)?;
        operations.sort_by_key(|operation| operation.key);

        Ok(operations)
    }

    async fn pending_operations(&self) -> DbResult<Vec<StakeOperation>> {
        let pool = &self.pool;

        let records = self
            .with_retries("list pending operations", move || {
                sqlx::query_scalar::<_, String>(
                    "SELECT record FROM stake_operations
                        WHERE phase NOT IN ('Completed', 'Failed')
                        ORDER BY op_key",
                )
                .fetch_all(pool)
            })
            .await?;

        let mut operations = decode_records(records)?;
        operations.sort_by_key(|operation| operation.key);

        Ok(operations)
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, U256};
    use stakeflow_primitives::{
        errors::{ErrorKind, StepName},
        ids::{BlsProofOfPossession, BlsPublicKey, NodeId, ValidationId},
        operation::{
            OperationFailure, OperationPhase, StakeIntent, ValidatorRegistrationParams,
            ValidatorRemovalParams,
        },
    };

    use super::*;

    async fn memory_db() -> SqliteOperationDb {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteOperationDb::migrate(&pool).await.unwrap();

        SqliteOperationDb::new(pool, DbConfig::default())
    }

    fn registration() -> StakeOperation {
        StakeOperation::new(StakeIntent::RegisterValidator(ValidatorRegistrationParams {
            node_id: NodeId::from([7u8; 20]),
            bls_public_key: BlsPublicKey::from([8u8; 48]),
            bls_proof_of_possession: BlsProofOfPossession::from([9u8; 96]),
            stake: U256::from(100u64),
            min_stake_duration: 30 * 24 * 60 * 60,
            delegation_fee_bips: 200,
            reward_recipient: Address::repeat_byte(1),
        }))
    }

    fn removal(byte: u8) -> StakeOperation {
        StakeOperation::new(StakeIntent::RemoveValidator(ValidatorRemovalParams {
            validation_id: ValidationId::from([byte; 32]),
            include_uptime_proof: true,
        }))
    }

    #[tokio::test]
    async fn stores_and_replaces_records() {
        let db = memory_db().await;
        let mut op = registration();

        assert!(db.get_operation(op.key).await.unwrap().is_none());
        db.put_operation(&op).await.unwrap();
        assert_eq!(db.get_operation(op.key).await.unwrap(), Some(op.clone()));

        op.artifacts.message_index = Some(3);
        op.advance(OperationPhase::PlatformChainConfirmed);
        db.put_operation(&op).await.unwrap();

        let stored = db.get_operation(op.key).await.unwrap().unwrap();
        assert_eq!(stored, op);
        assert_eq!(db.list_operations().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn pending_excludes_completed_and_failed() {
        let db = memory_db().await;

        let mut completed = removal(1);
        completed.advance(OperationPhase::Completed);
        let mut failed = removal(2);
        failed.fail(OperationFailure {
            step: StepName::Sign,
            kind: ErrorKind::SignatureAggregationFailure,
            message: "quorums 67, 50, 33 exhausted".to_string(),
            tx_hash: None,
        });
        let open = removal(3);

        for op in [&completed, &failed, &open] {
            db.put_operation(op).await.unwrap();
        }

        assert_eq!(db.pending_operations().await.unwrap(), vec![open]);
        assert_eq!(db.list_operations().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn only_one_claim_on_a_key_wins() {
        let db = memory_db().await;
        let mut claim = registration();
        claim.claimed_at = Some(1_000);

        let (first, second) = tokio::join!(
            db.claim_operation(&claim, 900),
            db.claim_operation(&claim, 900)
        );
        assert!(first.unwrap() ^ second.unwrap());

        // once the hash is recorded the claim is gone and the record is kept
        let mut broadcast = claim.clone();
        broadcast.claimed_at = None;
        broadcast.artifacts.initiate_tx = Some(Default::default());
        db.put_operation(&broadcast).await.unwrap();
        assert!(!db.claim_operation(&claim, u64::MAX).await.unwrap());

        broadcast.fail(OperationFailure {
            step: StepName::Initiate,
            kind: ErrorKind::TransactionReverted,
            message: "initiate transaction reverted".to_string(),
            tx_hash: None,
        });
        db.put_operation(&broadcast).await.unwrap();
        assert!(db.claim_operation(&claim, 0).await.unwrap());
        assert_eq!(db.get_operation(claim.key).await.unwrap(), Some(claim));
    }

    #[tokio::test]
    async fn stale_claims_can_be_taken_over() {
        let db = memory_db().await;
        let mut claim = removal(5);
        claim.claimed_at = Some(1_000);
        assert!(db.claim_operation(&claim, 0).await.unwrap());

        let mut takeover = claim.clone();
        takeover.claimed_at = Some(5_000);
        assert!(!db.claim_operation(&takeover, 1_000).await.unwrap());
        assert!(db.claim_operation(&takeover, 1_001).await.unwrap());
        assert_eq!(
            db.get_operation(claim.key).await.unwrap().unwrap().claimed_at,
            Some(5_000)
        );
    }

    #[tokio::test]
    async fn open_creates_file_and_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stakeflow.db");
        let op = registration();

        {
            let db = SqliteOperationDb::open(&path, DbConfig::default())
                .await
                .unwrap();
            db.put_operation(&op).await.unwrap();
            db.pool.close().await;
        }

        let db = SqliteOperationDb::open(&path, DbConfig::default())
            .await
            .unwrap();
        assert_eq!(db.get_operation(op.key).await.unwrap(), Some(op));
    }

    #[tokio::test]
    async fn corrupt_record_is_reported_as_invalid_data() {
        let db = memory_db().await;
        let key = removal(4).key;

        sqlx::query(
            "INSERT INTO stake_operations (op_key, kind, phase, record)
                VALUES (?1, 'RemoveValidator', 'Initiated', 'not json')",
        )
        .bind(key.to_string())
        .execute(&db.pool)
        .await
        .unwrap();

        let err = db.get_operation(key).await.unwrap_err();
        assert!(matches!(
            err,
            crate::DbError::Storage(StorageError::InvalidData(_))
        ));
    }
}
