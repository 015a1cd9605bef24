//! Postgres-backed [`DurableStore`], grounded in `ferrex-core`'s
//! `database/postgres.rs` connection-pool-and-upsert pattern. Uses the
//! runtime query builder (`sqlx::query`/`query_as`) rather than the
//! compile-time-checked `query!` macros, since this crate has no live
//! database to check against at build time.

use crate::error::EngineError;
use crate::store::{DurableStore, Event, Room, RoomStatus, ViewerRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use protocol::{EventType, RoomId, ViewerId};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::info;

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self, EngineError> {
        info!("connecting to postgres");
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(database_url)
            .await
            .map_err(|e| EngineError::StorageError(format!("failed to connect: {e}")))?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), EngineError> {
        let migration_sql = include_str!("../../server/migrations/0001_initial.sql");
        sqlx::query(migration_sql)
            .execute(&self.pool)
            .await
            .map_err(|e| EngineError::StorageError(format!("migration failed: {e}")))?;
        Ok(())
    }

    fn row_to_room(row: &sqlx::postgres::PgRow) -> Result<Room, EngineError> {
        let status_str: String = row.try_get("status").map_err(sqlx_err)?;
        let status = if status_str == "ended" { RoomStatus::Ended } else { RoomStatus::Active };
        Ok(Room {
            id: RoomId::from(row.try_get::<String, _>("id").map_err(sqlx_err)?),
            presenter_id: row.try_get("presenter_id").map_err(sqlx_err)?,
            created_at: row.try_get("created_at").map_err(sqlx_err)?,
            expires_at: row.try_get("expires_at").map_err(sqlx_err)?,
            status,
            settings: row.try_get("settings").map_err(sqlx_err)?,
            ended_at: row.try_get("ended_at").map_err(sqlx_err)?,
        })
    }
}

fn sqlx_err(e: sqlx::Error) -> EngineError {
    EngineError::StorageError(e.to_string())
}

#[async_trait]
impl DurableStore for PostgresStore {
    async fn append_event(
        &self,
        room: &RoomId,
        viewer: Option<&ViewerId>,
        ty: EventType,
        metadata: &str,
    ) -> Result<Event, EngineError> {
        let row = sqlx::query(
            r#"
            INSERT INTO events (room_id, viewer_id, event_type, triggered_at, metadata)
            VALUES ($1, $2, $3, NOW(), $4)
            RETURNING id, triggered_at
            "#,
        )
        .bind(room.as_str())
        .bind(viewer.map(ViewerId::as_str))
        .bind(ty.as_str())
        .bind(metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_err)?;

        Ok(Event {
            id: row.try_get("id").map_err(sqlx_err)?,
            room_id: room.clone(),
            viewer_id: viewer.cloned(),
            event_type: ty,
            triggered_at: row.try_get("triggered_at").map_err(sqlx_err)?,
            metadata: metadata.to_string(),
        })
    }

    async fn counts_by_event_and_viewer(
        &self,
        room: &RoomId,
    ) -> Result<Vec<(EventType, ViewerId, Option<String>, i64)>, EngineError> {
        let rows = sqlx::query(
            r#"
            SELECT e.event_type, e.viewer_id, v.name AS viewer_name, COUNT(*) AS count
            FROM events e
            LEFT JOIN viewers v ON v.id = e.viewer_id
            WHERE e.room_id = $1 AND e.viewer_id IS NOT NULL
            GROUP BY e.event_type, e.viewer_id, v.name
            "#,
        )
        .bind(room.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_err)?;

        rows.into_iter()
            .map(|row| {
                let ty_str: String = row.try_get("event_type").map_err(sqlx_err)?;
                let ty = EventType::from_str(&ty_str).map_err(|e| EngineError::InvalidEventType(e.to_string()))?;
                Ok((
                    ty,
                    ViewerId::from(row.try_get::<String, _>("viewer_id").map_err(sqlx_err)?),
                    row.try_get("viewer_name").map_err(sqlx_err)?,
                    row.try_get("count").map_err(sqlx_err)?,
                ))
            })
            .collect()
    }

    async fn totals_by_event(&self, room: &RoomId) -> Result<HashMap<EventType, i64>, EngineError> {
        let rows = sqlx::query(
            "SELECT event_type, COUNT(*) AS count FROM events WHERE room_id = $1 GROUP BY event_type",
        )
        .bind(room.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_err)?;

        let mut totals: HashMap<EventType, i64> = EventType::ALL.iter().map(|ty| (*ty, 0)).collect();
        for row in rows {
            let ty_str: String = row.try_get("event_type").map_err(sqlx_err)?;
            let ty = EventType::from_str(&ty_str).map_err(|e| EngineError::InvalidEventType(e.to_string()))?;
            totals.insert(ty, row.try_get("count").map_err(sqlx_err)?);
        }
        Ok(totals)
    }

    async fn totals_by_viewer(
        &self,
        room: &RoomId,
    ) -> Result<Vec<(ViewerId, Option<String>, i64)>, EngineError> {
        let rows = sqlx::query(
            r#"
            SELECT e.viewer_id, v.name AS viewer_name, COUNT(*) AS count
            FROM events e
            LEFT JOIN viewers v ON v.id = e.viewer_id
            WHERE e.room_id = $1 AND e.viewer_id IS NOT NULL
            GROUP BY e.viewer_id, v.name
            ORDER BY count DESC, e.viewer_id ASC
            "#,
        )
        .bind(room.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_err)?;

        rows.into_iter()
            .map(|row| {
                Ok((
                    ViewerId::from(row.try_get::<String, _>("viewer_id").map_err(sqlx_err)?),
                    row.try_get("viewer_name").map_err(sqlx_err)?,
                    row.try_get("count").map_err(sqlx_err)?,
                ))
            })
            .collect()
    }

    async fn counts_for_viewer(
        &self,
        room: &RoomId,
        viewer: &ViewerId,
    ) -> Result<HashMap<EventType, i64>, EngineError> {
        let rows = sqlx::query(
            "SELECT event_type, COUNT(*) AS count FROM events WHERE room_id = $1 AND viewer_id = $2 GROUP BY event_type",
        )
        .bind(room.as_str())
        .bind(viewer.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_err)?;

        let mut totals: HashMap<EventType, i64> = EventType::ALL.iter().map(|ty| (*ty, 0)).collect();
        for row in rows {
            let ty_str: String = row.try_get("event_type").map_err(sqlx_err)?;
            let ty = EventType::from_str(&ty_str).map_err(|e| EngineError::InvalidEventType(e.to_string()))?;
            totals.insert(ty, row.try_get("count").map_err(sqlx_err)?);
        }
        Ok(totals)
    }

    async fn get_room(&self, room: &RoomId) -> Result<Option<Room>, EngineError> {
        let row = sqlx::query("SELECT * FROM rooms WHERE id = $1")
            .bind(room.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_err)?;
        row.as_ref().map(Self::row_to_room).transpose()
    }

    async fn create_room_if_absent(&self, room: &RoomId, presenter_id: &str) -> Result<Room, EngineError> {
        let row = sqlx::query(
            r#"
            INSERT INTO rooms (id, presenter_id, created_at, status, settings)
            VALUES ($1, $2, NOW(), 'active', '')
            ON CONFLICT (id) DO UPDATE SET id = EXCLUDED.id
            RETURNING *
            "#,
        )
        .bind(room.as_str())
        .bind(presenter_id)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_err)?;
        Self::row_to_room(&row)
    }

    async fn mark_room_ended(&self, room: &RoomId, ended_at: DateTime<Utc>) -> Result<(), EngineError> {
        sqlx::query(
            "UPDATE rooms SET status = 'ended', ended_at = $2 WHERE id = $1 AND status = 'active'",
        )
        .bind(room.as_str())
        .bind(ended_at)
        .execute(&self.pool)
        .await
        .map_err(sqlx_err)?;
        Ok(())
    }

    async fn ensure_viewer_id(&self, maybe_id: Option<&str>) -> Result<ViewerId, EngineError> {
        if let Some(id) = maybe_id {
            let exists = sqlx::query("SELECT 1 FROM viewers WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(sqlx_err)?;
            if exists.is_some() {
                return Ok(ViewerId::from(id));
            }
        }
        let fresh = ViewerId::from(crate::ids::generate_id());
        sqlx::query("INSERT INTO viewers (id, created_at, updated_at) VALUES ($1, NOW(), NOW())")
            .bind(fresh.as_str())
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;
        Ok(fresh)
    }

    async fn set_viewer_name(&self, id: &ViewerId, name: &str) -> Result<(), EngineError> {
        let normalized = crate::store::normalize_viewer_name(name);
        sqlx::query(
            r#"
            INSERT INTO viewers (id, name, created_at, updated_at)
            VALUES ($1, $2, NOW(), NOW())
            ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, updated_at = NOW()
            "#,
        )
        .bind(id.as_str())
        .bind(normalized)
        .execute(&self.pool)
        .await
        .map_err(sqlx_err)?;
        Ok(())
    }

    async fn get_viewer(&self, id: &ViewerId) -> Result<Option<ViewerRecord>, EngineError> {
        let row = sqlx::query("SELECT * FROM viewers WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_err)?;
        row.map(|row| {
            Ok(ViewerRecord {
                id: ViewerId::from(row.try_get::<String, _>("id").map_err(sqlx_err)?),
                name: row.try_get("name").map_err(sqlx_err)?,
                created_at: row.try_get("created_at").map_err(sqlx_err)?,
                updated_at: row.try_get("updated_at").map_err(sqlx_err)?,
            })
        })
        .transpose()
    }
}
