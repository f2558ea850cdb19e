//! Cache persistence: device state singleton, playlist snapshots, poll
//! history.

use rusqlite::{params, OptionalExtension, Row};
use serde_json::Value;

use crate::cache::store::CacheStore;
use crate::cache::types::{CachedDeviceState, CachedPlaylistSnapshot, PollResult};
use crate::device::DeviceStatus;
use crate::storage::database::Database;
use crate::storage::error::StorageResult;

fn poll_from_row(row: &Row<'_>) -> rusqlite::Result<(PollResult, Option<String>)> {
    Ok((
        PollResult {
            success: row.get(0)?,
            response_time_ms: row.get::<_, i64>(1)?.max(0) as u64,
            error_message: row.get(2)?,
            device_status: None,
            consecutive_failures: row.get(4)?,
            timestamp: row.get(5)?,
        },
        row.get(3)?,
    ))
}

impl CacheStore for Database {
    fn device_state(&self) -> StorageResult<Option<CachedDeviceState>> {
        let row = self
            .conn()
            .query_row(
                "SELECT device_json, last_poll_success, last_error, last_updated, last_success_at
                 FROM fpp_state WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, bool>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, Option<i64>>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((device_json, last_poll_success, last_error, last_updated, last_success_at)) = row
        else {
            return Ok(None);
        };
        let device: DeviceStatus = serde_json::from_str(&device_json)?;
        Ok(Some(CachedDeviceState {
            device,
            last_poll_success,
            last_error,
            last_updated,
            last_success_at,
        }))
    }

    fn write_device_state(&self, state: &CachedDeviceState) -> StorageResult<()> {
        let device_json = serde_json::to_string(&state.device)?;
        self.conn().execute(
            r#"
            INSERT INTO fpp_state (id, device_json, last_poll_success, last_error, last_updated, last_success_at)
            VALUES (1, ?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                device_json = excluded.device_json,
                last_poll_success = excluded.last_poll_success,
                last_error = excluded.last_error,
                last_updated = excluded.last_updated,
                last_success_at = excluded.last_success_at
            "#,
            params![
                device_json,
                state.last_poll_success,
                state.last_error,
                state.last_updated,
                state.last_success_at,
            ],
        )?;
        Ok(())
    }

    fn playlist(&self, name: &str) -> StorageResult<Option<CachedPlaylistSnapshot>> {
        let row = self
            .conn()
            .query_row(
                "SELECT name, raw_data, synced_at FROM cached_playlists WHERE name = ?1",
                params![name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((name, raw, synced_at)) => Ok(Some(CachedPlaylistSnapshot {
                name,
                raw_data: serde_json::from_str(&raw)?,
                synced_at,
            })),
            None => Ok(None),
        }
    }

    fn write_playlist(&self, name: &str, raw_data: &Value, synced_at: i64) -> StorageResult<()> {
        let raw = serde_json::to_string(raw_data)?;
        self.conn().execute(
            r#"
            INSERT INTO cached_playlists (name, raw_data, synced_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(name) DO UPDATE SET
                raw_data = excluded.raw_data,
                synced_at = excluded.synced_at
            "#,
            params![name, raw, synced_at],
        )?;
        Ok(())
    }

    fn append_poll_result(&self, result: &PollResult) -> StorageResult<()> {
        let device_json = result
            .device_status
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        self.conn().execute(
            r#"
            INSERT INTO poll_history (success, response_time_ms, error_message, device_json, consecutive_failures, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                result.success,
                result.response_time_ms as i64,
                result.error_message,
                device_json,
                result.consecutive_failures,
                result.timestamp,
            ],
        )?;
        Ok(())
    }

    fn recent_polls(&self, limit: u32) -> StorageResult<Vec<PollResult>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            r#"
            SELECT success, response_time_ms, error_message, device_json, consecutive_failures, timestamp
            FROM poll_history
            ORDER BY timestamp DESC, id DESC
            LIMIT ?1
            "#,
        )?;
        let rows = stmt.query_map(params![limit], poll_from_row)?;

        let mut out = Vec::new();
        for row in rows {
            let (mut result, device_json) = row?;
            if let Some(json) = device_json {
                result.device_status = Some(serde_json::from_str(&json)?);
            }
            out.push(result);
        }
        Ok(out)
    }

    fn trim_poll_history(&self, retain: u32) -> StorageResult<usize> {
        let removed = self.conn().execute(
            r#"
            DELETE FROM poll_history WHERE id NOT IN (
                SELECT id FROM poll_history ORDER BY timestamp DESC, id DESC LIMIT ?1
            )
            "#,
            params![retain],
        )?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn status(name: &str) -> DeviceStatus {
        DeviceStatus {
            current_playlist: Some(name.to_string()),
            status: "playing".into(),
            ..DeviceStatus::unknown()
        }
    }

    fn poll(success: bool, timestamp: i64) -> PollResult {
        PollResult {
            success,
            response_time_ms: 12,
            error_message: (!success).then(|| "refused".to_string()),
            device_status: success.then(|| status("Main")),
            consecutive_failures: u32::from(!success),
            timestamp,
        }
    }

    #[test]
    fn test_device_state_roundtrip_and_overwrite() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.device_state().unwrap().is_none());

        let first = CachedDeviceState::from_status(status("Main"), 1_000);
        db.write_device_state(&first).unwrap();
        let mut second = first.clone();
        second.mark_failed("timeout", 2_000);
        db.write_device_state(&second).unwrap();

        assert_eq!(db.device_state().unwrap(), Some(second));
    }

    #[test]
    fn test_playlist_upsert_is_last_writer_wins() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.playlist("Main").unwrap().is_none());

        db.write_playlist("Main", &json!({"name": "Main", "version": 1}), 1_000).unwrap();
        db.write_playlist("Main", &json!({"name": "Main", "version": 2}), 2_000).unwrap();

        let snapshot = db.playlist("Main").unwrap().unwrap();
        assert_eq!(snapshot.raw_data["version"], 2);
        assert_eq!(snapshot.synced_at, 2_000);
        assert_eq!(snapshot.age_millis(2_500), 500);
    }

    #[test]
    fn test_history_is_most_recent_first() {
        let db = Database::open_in_memory().unwrap();
        db.append_poll_result(&poll(true, 1_000)).unwrap();
        db.append_poll_result(&poll(false, 2_000)).unwrap();
        db.append_poll_result(&poll(true, 3_000)).unwrap();

        let recent = db.recent_polls(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].timestamp, 3_000);
        assert_eq!(recent[1].timestamp, 2_000);
        assert!(!recent[1].success);
        assert_eq!(recent[1].error_message.as_deref(), Some("refused"));
        assert_eq!(recent[0].device_status, Some(status("Main")));
    }

    #[test]
    fn test_trim_keeps_newest_rows() {
        let db = Database::open_in_memory().unwrap();
        for ts in 0..10 {
            db.append_poll_result(&poll(true, ts)).unwrap();
        }

        assert_eq!(db.trim_poll_history(3).unwrap(), 7);
        let kept: Vec<_> = db.recent_polls(20).unwrap().iter().map(|p| p.timestamp).collect();
        assert_eq!(kept, vec![9, 8, 7]);
        assert_eq!(db.trim_poll_history(3).unwrap(), 0);
    }
}
