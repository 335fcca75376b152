//! PostgreSQL adapter: the transactional source of truth for every
//! Sanctuary entity (§6 "Persisted state layout").
//!
//! Schema migration follows §9 "Schema migration": list the columns of a
//! target table with `information_schema` before issuing an additive,
//! idempotent `ALTER TABLE`, rather than relying on `IF NOT EXISTS` alone.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sanctuary_crypto::PublicKey;
use sanctuary_types::{
    Address, Agent, AgentStatus, Attestation, ChallengeNonce, LedgerTxStatus, ResurrectionEvent,
    SignalBreakdown, Snapshot, SnapshotId, SnapshotMeta, StorageHandle, TrustLevel, TrustScore,
    TxHandle,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;

use crate::error::StorageError;
use crate::traits::{
    AgentRepository, AttestationRepository, ChallengeRecord, ChallengeRepository,
    HeartbeatRepository, NewSnapshot, ResurrectionRepository, SnapshotRepository,
    TrustScoreRepository,
};
use crate::StorageResult;

/// PostgreSQL-backed storage adapter.
#[derive(Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with_options(database_url, 10, 5).await
    }

    pub async fn connect_with_options(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Backend(format!("failed to connect postgres: {e}")))?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub async fn from_pool(pool: PgPool) -> StorageResult<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn init_schema(&self) -> StorageResult<()> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS agents (
                address TEXT PRIMARY KEY,
                recovery_public_key TEXT NOT NULL,
                recall_public_key TEXT NOT NULL,
                manifest_hash TEXT NOT NULL,
                manifest_version INTEGER NOT NULL,
                registered_at TIMESTAMPTZ NOT NULL,
                status TEXT NOT NULL,
                genesis_declaration TEXT
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_agents_status ON agents (status)",
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                id UUID PRIMARY KEY,
                agent TEXT NOT NULL,
                seq BIGINT NOT NULL,
                storage_handle TEXT NOT NULL,
                size_bytes BIGINT NOT NULL,
                client_timestamp TIMESTAMPTZ NOT NULL,
                received_at TIMESTAMPTZ NOT NULL,
                manifest_hash TEXT NOT NULL,
                prev_backup_hash TEXT NOT NULL,
                snapshot_meta JSONB,
                UNIQUE (agent, seq)
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_snapshots_agent ON snapshots (agent)",
            r#"
            CREATE TABLE IF NOT EXISTS auth_challenges (
                nonce TEXT PRIMARY KEY,
                agent TEXT NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL,
                consumed BOOLEAN NOT NULL DEFAULT FALSE
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_auth_challenges_expiry ON auth_challenges (expires_at)",
            r#"
            CREATE TABLE IF NOT EXISTS attestation_notes (
                hash TEXT PRIMARY KEY,
                text TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS attestations (
                id UUID PRIMARY KEY,
                from_agent TEXT NOT NULL,
                about_agent TEXT NOT NULL,
                note_hash TEXT NOT NULL,
                tx_handle TEXT NOT NULL,
                simulated BOOLEAN NOT NULL,
                status TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_attestations_about ON attestations (about_agent)",
            "CREATE INDEX IF NOT EXISTS idx_attestations_from ON attestations (from_agent)",
            r#"
            CREATE TABLE IF NOT EXISTS resurrection_log (
                id UUID PRIMARY KEY,
                agent TEXT NOT NULL,
                occurred_at TIMESTAMPTZ NOT NULL,
                previous_status TEXT NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_resurrection_log_agent ON resurrection_log (agent)",
            r#"
            CREATE TABLE IF NOT EXISTS heartbeats (
                id BIGSERIAL PRIMARY KEY,
                agent TEXT NOT NULL,
                at TIMESTAMPTZ NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_heartbeats_agent ON heartbeats (agent)",
            r#"
            CREATE TABLE IF NOT EXISTS trust_scores (
                agent TEXT PRIMARY KEY,
                raw_score DOUBLE PRECISION NOT NULL,
                level TEXT NOT NULL,
                unique_attesters BIGINT NOT NULL,
                computed_at TIMESTAMPTZ NOT NULL,
                breakdown JSONB NOT NULL
            )
            "#,
        ];

        for stmt in ddl {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(format!("schema init failed: {e}")))?;
        }

        // A deployment that predates `genesis_declaration` gets it added
        // here, idempotently, and only if introspection shows it missing.
        self.add_column_if_missing("agents", "genesis_declaration", "TEXT")
            .await?;

        Ok(())
    }

    async fn add_column_if_missing(
        &self,
        table: &str,
        column: &str,
        ddl_type: &str,
    ) -> StorageResult<()> {
        let row = sqlx::query(
            r#"
            SELECT 1 FROM information_schema.columns
             WHERE table_name = $1 AND column_name = $2
            "#,
        )
        .bind(table)
        .bind(column)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(format!("schema introspection failed: {e}")))?;

        if row.is_some() {
            return Ok(());
        }

        let stmt = format!("ALTER TABLE {table} ADD COLUMN {column} {ddl_type}");
        sqlx::query(&stmt)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("schema migration failed: {e}")))?;
        Ok(())
    }
}

fn pubkey_to_hex(key: &PublicKey) -> String {
    hex::encode(key.to_encoded_point(true).as_bytes())
}

fn pubkey_from_hex(s: &str) -> StorageResult<PublicKey> {
    let bytes = hex::decode(s).map_err(|e| StorageError::Serialization(e.to_string()))?;
    PublicKey::from_sec1_bytes(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn status_to_str(status: AgentStatus) -> &'static str {
    match status {
        AgentStatus::Living => "LIVING",
        AgentStatus::Fallen => "FALLEN",
        AgentStatus::Returned => "RETURNED",
    }
}

fn status_from_str(s: &str) -> StorageResult<AgentStatus> {
    match s {
        "LIVING" => Ok(AgentStatus::Living),
        "FALLEN" => Ok(AgentStatus::Fallen),
        "RETURNED" => Ok(AgentStatus::Returned),
        other => Err(StorageError::Serialization(format!(
            "unknown agent status `{other}`"
        ))),
    }
}

fn ledger_status_to_str(status: LedgerTxStatus) -> &'static str {
    match status {
        LedgerTxStatus::Pending => "pending",
        LedgerTxStatus::Confirmed => "confirmed",
        LedgerTxStatus::Failed => "failed",
        LedgerTxStatus::Simulated => "simulated",
    }
}

fn ledger_status_from_str(s: &str) -> StorageResult<LedgerTxStatus> {
    match s {
        "pending" => Ok(LedgerTxStatus::Pending),
        "confirmed" => Ok(LedgerTxStatus::Confirmed),
        "failed" => Ok(LedgerTxStatus::Failed),
        "simulated" => Ok(LedgerTxStatus::Simulated),
        other => Err(StorageError::Serialization(format!(
            "unknown ledger status `{other}`"
        ))),
    }
}

fn level_to_str(level: TrustLevel) -> &'static str {
    match level {
        TrustLevel::Unverified => "UNVERIFIED",
        TrustLevel::Verified => "VERIFIED",
        TrustLevel::Established => "ESTABLISHED",
        TrustLevel::Pillar => "PILLAR",
    }
}

fn level_from_str(s: &str) -> StorageResult<TrustLevel> {
    match s {
        "UNVERIFIED" => Ok(TrustLevel::Unverified),
        "VERIFIED" => Ok(TrustLevel::Verified),
        "ESTABLISHED" => Ok(TrustLevel::Established),
        "PILLAR" => Ok(TrustLevel::Pillar),
        other => Err(StorageError::Serialization(format!(
            "unknown trust level `{other}`"
        ))),
    }
}

fn note_hash_to_hex(hash: &[u8; 32]) -> String {
    hex::encode(hash)
}

fn note_hash_from_hex(s: &str) -> StorageResult<[u8; 32]> {
    let bytes = hex::decode(s).map_err(|e| StorageError::Serialization(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| StorageError::Serialization("note hash must be 32 bytes".to_string()))
}

/// Deterministically fold an address into an `i64` advisory-lock key, used
/// to serialise concurrent `seq` allocation for the same agent (§4.5
/// "Store": "the `(agent, seq)` uniqueness constraint together with the
/// `max+1` read serialises concurrent uploads for the same agent").
fn advisory_lock_key(agent: &Address) -> i64 {
    let digest = sanctuary_crypto::keccak256(agent.as_bytes());
    i64::from_le_bytes(digest[..8].try_into().unwrap())
}

#[async_trait]
impl AgentRepository for PostgresStorage {
    async fn register(&self, agent: Agent) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO agents
                (address, recovery_public_key, recall_public_key, manifest_hash, manifest_version, registered_at, status, genesis_declaration)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (address) DO NOTHING
            "#,
        )
        .bind(agent.address.to_hex())
        .bind(pubkey_to_hex(&agent.recovery_public_key))
        .bind(pubkey_to_hex(&agent.recall_public_key))
        .bind(agent.manifest_hash)
        .bind(agent.manifest_version as i32)
        .bind(agent.registered_at)
        .bind(status_to_str(agent.status))
        .bind(agent.genesis_declaration)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict(format!(
                "agent {} already registered",
                agent.address
            )));
        }
        Ok(())
    }

    async fn get(&self, address: &Address) -> StorageResult<Option<Agent>> {
        let row = sqlx::query(
            r#"
            SELECT address, recovery_public_key, recall_public_key, manifest_hash, manifest_version, registered_at, status, genesis_declaration
              FROM agents WHERE address = $1
            "#,
        )
        .bind(address.to_hex())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(agent_row_to_record).transpose()
    }

    async fn set_status(&self, address: &Address, status: AgentStatus) -> StorageResult<()> {
        let result = sqlx::query("UPDATE agents SET status = $1 WHERE address = $2")
            .bind(status_to_str(status))
            .bind(address.to_hex())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("agent {address} not found")));
        }
        Ok(())
    }

    async fn list_living(&self) -> StorageResult<Vec<Address>> {
        let rows = sqlx::query("SELECT address FROM agents WHERE status = $1")
            .bind(status_to_str(AgentStatus::Living))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                let hex: String = row
                    .try_get("address")
                    .map_err(|e| StorageError::Backend(e.to_string()))?;
                Address::from_hex(&hex).map_err(|e| StorageError::Serialization(e.to_string()))
            })
            .collect()
    }

    async fn list_trust_recomputable(&self) -> StorageResult<Vec<Address>> {
        let rows = sqlx::query("SELECT address FROM agents WHERE status = $1 OR status = $2")
            .bind(status_to_str(AgentStatus::Living))
            .bind(status_to_str(AgentStatus::Returned))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                let hex: String = row
                    .try_get("address")
                    .map_err(|e| StorageError::Backend(e.to_string()))?;
                Address::from_hex(&hex).map_err(|e| StorageError::Serialization(e.to_string()))
            })
            .collect()
    }
}

fn agent_row_to_record(row: sqlx::postgres::PgRow) -> StorageResult<Agent> {
    let address_hex: String = row
        .try_get("address")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let recovery_hex: String = row
        .try_get("recovery_public_key")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let recall_hex: String = row
        .try_get("recall_public_key")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let status: String = row
        .try_get("status")
        .map_err(|e| StorageError::Backend(e.to_string()))?;

    Ok(Agent {
        address: Address::from_hex(&address_hex)
            .map_err(|e| StorageError::Serialization(e.to_string()))?,
        recovery_public_key: pubkey_from_hex(&recovery_hex)?,
        recall_public_key: pubkey_from_hex(&recall_hex)?,
        manifest_hash: row
            .try_get("manifest_hash")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        manifest_version: row
            .try_get::<i32, _>("manifest_version")
            .map_err(|e| StorageError::Backend(e.to_string()))? as u32,
        registered_at: row
            .try_get("registered_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        status: status_from_str(&status)?,
        genesis_declaration: row
            .try_get("genesis_declaration")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
    })
}

#[async_trait]
impl SnapshotRepository for PostgresStorage {
    async fn allocate_and_insert(&self, new: NewSnapshot) -> StorageResult<Snapshot> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(advisory_lock_key(&new.agent))
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let row = sqlx::query("SELECT COALESCE(MAX(seq), 0) AS max_seq FROM snapshots WHERE agent = $1")
            .bind(new.agent.to_hex())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let seq: i64 = row
            .try_get("max_seq")
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let seq = seq + 1;

        let received_at = Utc::now();
        let snapshot_meta_json = new
            .snapshot_meta
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO snapshots
                (id, agent, seq, storage_handle, size_bytes, client_timestamp, received_at, manifest_hash, prev_backup_hash, snapshot_meta)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(new.id)
        .bind(new.agent.to_hex())
        .bind(seq)
        .bind(new.storage_handle.0.clone())
        .bind(new.size_bytes as i64)
        .bind(new.client_timestamp)
        .bind(received_at)
        .bind(new.manifest_hash.clone())
        .bind(new.prev_backup_hash.clone())
        .bind(snapshot_meta_json)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(Snapshot {
            id: SnapshotId(new.id),
            agent: new.agent,
            seq: seq as u64,
            storage_handle: new.storage_handle,
            size_bytes: new.size_bytes,
            client_timestamp: new.client_timestamp,
            received_at,
            manifest_hash: new.manifest_hash,
            prev_backup_hash: new.prev_backup_hash,
            snapshot_meta: new.snapshot_meta,
        })
    }

    async fn last_for_agent(&self, agent: &Address) -> StorageResult<Option<Snapshot>> {
        let row = sqlx::query(
            r#"
            SELECT id, agent, seq, storage_handle, size_bytes, client_timestamp, received_at, manifest_hash, prev_backup_hash, snapshot_meta
              FROM snapshots WHERE agent = $1 ORDER BY seq DESC LIMIT 1
            "#,
        )
        .bind(agent.to_hex())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(snapshot_row_to_record).transpose()
    }

    async fn list_for_agent(&self, agent: &Address, limit: usize) -> StorageResult<Vec<Snapshot>> {
        let rows = if limit == 0 {
            sqlx::query(
                r#"
                SELECT id, agent, seq, storage_handle, size_bytes, client_timestamp, received_at, manifest_hash, prev_backup_hash, snapshot_meta
                  FROM snapshots WHERE agent = $1 ORDER BY seq DESC
                "#,
            )
            .bind(agent.to_hex())
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query(
                r#"
                SELECT id, agent, seq, storage_handle, size_bytes, client_timestamp, received_at, manifest_hash, prev_backup_hash, snapshot_meta
                  FROM snapshots WHERE agent = $1 ORDER BY seq DESC LIMIT $2
                "#,
            )
            .bind(agent.to_hex())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.into_iter().map(snapshot_row_to_record).collect()
    }

    async fn count_for_agent(&self, agent: &Address) -> StorageResult<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM snapshots WHERE agent = $1")
            .bind(agent.to_hex())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(n as u64)
    }

    async fn has_any_for_agent(&self, agent: &Address) -> StorageResult<bool> {
        Ok(self.count_for_agent(agent).await? > 0)
    }

    async fn uploaded_since(&self, agent: &Address, since: DateTime<Utc>) -> StorageResult<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM snapshots WHERE agent = $1 AND received_at >= $2) AS hit",
        )
        .bind(agent.to_hex())
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;
        row.try_get("hit")
            .map_err(|e| StorageError::Backend(e.to_string()))
    }
}

fn snapshot_row_to_record(row: sqlx::postgres::PgRow) -> StorageResult<Snapshot> {
    let agent_hex: String = row
        .try_get("agent")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let snapshot_meta_json: Option<serde_json::Value> = row
        .try_get("snapshot_meta")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let snapshot_meta: Option<SnapshotMeta> = snapshot_meta_json
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| StorageError::Serialization(e.to_string()))?;

    Ok(Snapshot {
        id: SnapshotId(
            row.try_get("id")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        agent: Address::from_hex(&agent_hex)
            .map_err(|e| StorageError::Serialization(e.to_string()))?,
        seq: row
            .try_get::<i64, _>("seq")
            .map_err(|e| StorageError::Backend(e.to_string()))? as u64,
        storage_handle: StorageHandle(
            row.try_get("storage_handle")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        size_bytes: row
            .try_get::<i64, _>("size_bytes")
            .map_err(|e| StorageError::Backend(e.to_string()))? as u64,
        client_timestamp: row
            .try_get("client_timestamp")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        received_at: row
            .try_get("received_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        manifest_hash: row
            .try_get("manifest_hash")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        prev_backup_hash: row
            .try_get("prev_backup_hash")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        snapshot_meta,
    })
}

#[async_trait]
impl ChallengeRepository for PostgresStorage {
    async fn create(&self, record: ChallengeRecord) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO auth_challenges (nonce, agent, expires_at, consumed) VALUES ($1, $2, $3, FALSE)",
        )
        .bind(record.nonce.to_hex())
        .bind(record.agent.to_hex())
        .bind(record.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn peek(&self, nonce: &ChallengeNonce) -> StorageResult<Option<ChallengeRecord>> {
        let row = sqlx::query("SELECT nonce, agent, expires_at FROM auth_challenges WHERE nonce = $1")
            .bind(nonce.to_hex())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(|row| {
            let nonce_hex: String = row
                .try_get("nonce")
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            let agent_hex: String = row
                .try_get("agent")
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            Ok(ChallengeRecord {
                nonce: ChallengeNonce::from_hex(&nonce_hex)
                    .ok_or_else(|| StorageError::Serialization("bad nonce hex".to_string()))?,
                agent: Address::from_hex(&agent_hex)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?,
                expires_at: row
                    .try_get("expires_at")
                    .map_err(|e| StorageError::Backend(e.to_string()))?,
            })
        })
        .transpose()
    }

    async fn try_consume(
        &self,
        nonce: &ChallengeNonce,
        now: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let result = sqlx::query(
            "UPDATE auth_challenges SET consumed = TRUE WHERE nonce = $1 AND consumed = FALSE AND expires_at > $2",
        )
        .bind(nonce.to_hex())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn expire_older_than(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM auth_challenges WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl AttestationRepository for PostgresStorage {
    async fn insert_note_if_absent(&self, hash: [u8; 32], text: String) -> StorageResult<()> {
        sqlx::query("INSERT INTO attestation_notes (hash, text) VALUES ($1, $2) ON CONFLICT (hash) DO NOTHING")
            .bind(note_hash_to_hex(&hash))
            .bind(text)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn exists_since(
        &self,
        from: &Address,
        about: &Address,
        since: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM attestations WHERE from_agent = $1 AND about_agent = $2 AND created_at >= $3) AS hit",
        )
        .bind(from.to_hex())
        .bind(about.to_hex())
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;
        row.try_get("hit")
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    async fn insert(&self, attestation: Attestation) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO attestations (id, from_agent, about_agent, note_hash, tx_handle, simulated, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(uuid::Uuid::new_v4())
        .bind(attestation.from.to_hex())
        .bind(attestation.about.to_hex())
        .bind(note_hash_to_hex(&attestation.note_hash))
        .bind(attestation.tx_handle.0)
        .bind(attestation.simulated)
        .bind(ledger_status_to_str(attestation.status))
        .bind(attestation.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn count_received(&self, about: &Address) -> StorageResult<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM attestations WHERE about_agent = $1")
            .bind(about.to_hex())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(n as u64)
    }

    async fn unique_attesters(&self, about: &Address) -> StorageResult<u64> {
        let row = sqlx::query(
            "SELECT COUNT(DISTINCT from_agent) AS n FROM attestations WHERE about_agent = $1",
        )
        .bind(about.to_hex())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(n as u64)
    }

    async fn list_all(&self) -> StorageResult<Vec<Attestation>> {
        let rows = sqlx::query(
            "SELECT from_agent, about_agent, note_hash, tx_handle, simulated, status, created_at FROM attestations",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                let from_hex: String = row
                    .try_get("from_agent")
                    .map_err(|e| StorageError::Backend(e.to_string()))?;
                let about_hex: String = row
                    .try_get("about_agent")
                    .map_err(|e| StorageError::Backend(e.to_string()))?;
                let note_hash_hex: String = row
                    .try_get("note_hash")
                    .map_err(|e| StorageError::Backend(e.to_string()))?;
                let status: String = row
                    .try_get("status")
                    .map_err(|e| StorageError::Backend(e.to_string()))?;
                Ok(Attestation {
                    from: Address::from_hex(&from_hex)
                        .map_err(|e| StorageError::Serialization(e.to_string()))?,
                    about: Address::from_hex(&about_hex)
                        .map_err(|e| StorageError::Serialization(e.to_string()))?,
                    note_hash: note_hash_from_hex(&note_hash_hex)?,
                    tx_handle: TxHandle(
                        row.try_get("tx_handle")
                            .map_err(|e| StorageError::Backend(e.to_string()))?,
                    ),
                    simulated: row
                        .try_get("simulated")
                        .map_err(|e| StorageError::Backend(e.to_string()))?,
                    status: ledger_status_from_str(&status)?,
                    created_at: row
                        .try_get("created_at")
                        .map_err(|e| StorageError::Backend(e.to_string()))?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ResurrectionRepository for PostgresStorage {
    async fn record(&self, event: ResurrectionEvent) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO resurrection_log (id, agent, occurred_at, previous_status) VALUES ($1, $2, $3, $4)",
        )
        .bind(uuid::Uuid::new_v4())
        .bind(event.agent.to_hex())
        .bind(event.occurred_at)
        .bind(status_to_str(event.previous_status))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn count_since(&self, agent: &Address, since: DateTime<Utc>) -> StorageResult<u64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM resurrection_log WHERE agent = $1 AND occurred_at >= $2",
        )
        .bind(agent.to_hex())
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(n as u64)
    }

    async fn count_total(&self, agent: &Address) -> StorageResult<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM resurrection_log WHERE agent = $1")
            .bind(agent.to_hex())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(n as u64)
    }
}

#[async_trait]
impl HeartbeatRepository for PostgresStorage {
    async fn record(&self, agent: &Address, at: DateTime<Utc>) -> StorageResult<()> {
        sqlx::query("INSERT INTO heartbeats (agent, at) VALUES ($1, $2)")
            .bind(agent.to_hex())
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn last(&self, agent: &Address) -> StorageResult<Option<DateTime<Utc>>> {
        let row = sqlx::query("SELECT MAX(at) AS last FROM heartbeats WHERE agent = $1")
            .bind(agent.to_hex())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        row.try_get("last")
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    async fn prune_keeping_latest(
        &self,
        keep_days: i64,
        now: DateTime<Utc>,
    ) -> StorageResult<u64> {
        let cutoff = now - Duration::days(keep_days);
        let result = sqlx::query(
            r#"
            DELETE FROM heartbeats
             WHERE at < $1
               AND id NOT IN (
                   SELECT DISTINCT ON (agent) id FROM heartbeats ORDER BY agent, at DESC
               )
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TrustScoreRepository for PostgresStorage {
    async fn upsert(&self, score: TrustScore) -> StorageResult<()> {
        let breakdown_json = serde_json::to_value(score.breakdown)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO trust_scores (agent, raw_score, level, unique_attesters, computed_at, breakdown)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (agent) DO UPDATE SET
                raw_score = EXCLUDED.raw_score,
                level = EXCLUDED.level,
                unique_attesters = EXCLUDED.unique_attesters,
                computed_at = EXCLUDED.computed_at,
                breakdown = EXCLUDED.breakdown
            "#,
        )
        .bind(score.agent.to_hex())
        .bind(score.raw_score)
        .bind(level_to_str(score.level))
        .bind(score.unique_attesters as i64)
        .bind(score.computed_at)
        .bind(breakdown_json)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, agent: &Address) -> StorageResult<Option<TrustScore>> {
        let row = sqlx::query(
            "SELECT agent, raw_score, level, unique_attesters, computed_at, breakdown FROM trust_scores WHERE agent = $1",
        )
        .bind(agent.to_hex())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(|row| {
            let agent_hex: String = row
                .try_get("agent")
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            let level: String = row
                .try_get("level")
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            let breakdown_json: serde_json::Value = row
                .try_get("breakdown")
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            let breakdown: SignalBreakdown = serde_json::from_value(breakdown_json)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;

            Ok(TrustScore {
                agent: Address::from_hex(&agent_hex)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?,
                raw_score: row
                    .try_get("raw_score")
                    .map_err(|e| StorageError::Backend(e.to_string()))?,
                level: level_from_str(&level)?,
                unique_attesters: row
                    .try_get::<i64, _>("unique_attesters")
                    .map_err(|e| StorageError::Backend(e.to_string()))? as u64,
                computed_at: row
                    .try_get("computed_at")
                    .map_err(|e| StorageError::Backend(e.to_string()))?,
                breakdown,
            })
        })
        .transpose()
    }
}
