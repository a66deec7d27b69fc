//! PostgreSQL scan store.
//!
//! The change-notification feed rides on LISTEN/NOTIFY: the schema
//! installs an `AFTER INSERT OR UPDATE OR DELETE` trigger that
//! `pg_notify`s the operation name, and a single `PgListener` task
//! forwards notifications into a broadcast channel shared by all
//! subscribers. Writes from any origin (this process, bulk imports,
//! administrative edits) surface on the same feed.

use seamline_model::{ScanEvent, ScanRecord};
use sqlx::Row;
use sqlx::postgres::{PgListener, PgPool, PgPoolOptions};
use tokio::sync::{Mutex, broadcast};
use tracing::{error, warn};
use uuid::Uuid;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::store::{ScanStore, StoreChange};

/// NOTIFY channel the scan-events trigger publishes on.
const CHANGE_CHANNEL: &str = "scan_events_changed";

const SCHEMA_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS scan_events (
        record_key UUID PRIMARY KEY,
        scan_id TEXT NOT NULL,
        tag_id TEXT NOT NULL,
        station_id TEXT NOT NULL,
        scanned_at BIGINT NOT NULL,
        received_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CONSTRAINT scan_events_scan_id_key UNIQUE (scan_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS scan_events_tag_id_idx ON scan_events (tag_id)",
    "CREATE INDEX IF NOT EXISTS scan_events_scanned_at_idx ON scan_events (scanned_at)",
    r#"
    CREATE OR REPLACE FUNCTION scan_events_notify() RETURNS trigger AS $$
    BEGIN
        PERFORM pg_notify('scan_events_changed', TG_OP);
        RETURN NULL;
    END;
    $$ LANGUAGE plpgsql
    "#,
    "DROP TRIGGER IF EXISTS scan_events_changed ON scan_events",
    r#"
    CREATE TRIGGER scan_events_changed
        AFTER INSERT OR UPDATE OR DELETE ON scan_events
        FOR EACH ROW EXECUTE FUNCTION scan_events_notify()
    "#,
];

pub struct PostgresScanStore {
    pool: PgPool,
    changes: broadcast::Sender<StoreChange>,
    listener_started: Mutex<bool>,
}

impl std::fmt::Debug for PostgresScanStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresScanStore")
            .field("subscriber_count", &self.changes.receiver_count())
            .finish_non_exhaustive()
    }
}

impl PostgresScanStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await?;
        let (changes, _) = broadcast::channel(256);

        Ok(Self {
            pool,
            changes,
            listener_started: Mutex::new(false),
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the scan-events table, unique scan id constraint and the
    /// change-notification trigger. Idempotent.
    pub async fn initialize_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA_STATEMENTS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Start the LISTEN task on first subscription. Failure here means
    /// the store cannot provide a change feed; callers degrade.
    async fn ensure_listener(&self) -> Result<(), StoreError> {
        let mut started = self.listener_started.lock().await;
        if *started {
            return Ok(());
        }

        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(|err| StoreError::ChangeFeedUnavailable {
                reason: err.to_string(),
            })?;
        listener
            .listen(CHANGE_CHANNEL)
            .await
            .map_err(|err| StoreError::ChangeFeedUnavailable {
                reason: err.to_string(),
            })?;

        let changes = self.changes.clone();
        tokio::spawn(async move {
            loop {
                match listener.recv().await {
                    Ok(notification) => {
                        let change = match notification.payload() {
                            "INSERT" => StoreChange::Insert,
                            "UPDATE" => StoreChange::Update,
                            "DELETE" => StoreChange::Delete,
                            other => {
                                warn!(operation = other, "unexpected change payload");
                                StoreChange::Update
                            }
                        };
                        let _ = changes.send(change);
                    }
                    Err(err) => {
                        // recv() reconnects internally; transient errors
                        // only cost the notifications missed in between.
                        error!(error = %err, "scan change listener error");
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    }
                }
            }
        });

        *started = true;
        Ok(())
    }
}

#[async_trait]
impl ScanStore for PostgresScanStore {
    async fn insert_scan(&self, event: &ScanEvent) -> Result<ScanRecord, StoreError> {
        let record_key = Uuid::now_v7();
        let result = sqlx::query(
            r#"
            INSERT INTO scan_events (record_key, scan_id, tag_id, station_id, scanned_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(record_key)
        .bind(&event.id)
        .bind(&event.tag_id)
        .bind(&event.station_id)
        .bind(event.timestamp)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(ScanRecord::new(record_key, event.clone())),
            Err(sqlx::Error::Database(db_err)) => {
                let code = db_err.code().map(|c| c.to_string());
                if code.as_deref() == Some("23505") {
                    Err(StoreError::Duplicate {
                        id: event.id.clone(),
                    })
                } else {
                    Err(StoreError::Database(sqlx::Error::Database(db_err)))
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn list_scans(&self) -> Result<Vec<ScanRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT record_key, scan_id, tag_id, station_id, scanned_at
            FROM scan_events
            ORDER BY record_key
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                ScanRecord::new(
                    row.get("record_key"),
                    ScanEvent {
                        id: row.get("scan_id"),
                        tag_id: row.get("tag_id"),
                        station_id: row.get("station_id"),
                        timestamp: row.get("scanned_at"),
                    },
                )
            })
            .collect())
    }

    async fn subscribe_changes(
        &self,
    ) -> Result<broadcast::Receiver<StoreChange>, StoreError> {
        self.ensure_listener().await?;
        Ok(self.changes.subscribe())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
