//! Breaker persistence: a single row keyed by `id = 1`.

use rusqlite::{params, OptionalExtension};

use crate::resilience::circuit_breaker::{BreakerSnapshot, BreakerStore, CircuitState};
use crate::storage::database::Database;
use crate::storage::error::{StorageError, StorageResult};

impl BreakerStore for Database {
    fn load_breaker(&self) -> StorageResult<Option<BreakerSnapshot>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                r#"
                SELECT state, failure_count, success_count, total_transitions, consecutive_trips,
                       last_failure_time, last_state_change_time, opened_at, created_at
                FROM circuit_breaker_state WHERE id = 1
                "#,
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        BreakerSnapshot {
                            state: CircuitState::Closed,
                            failure_count: row.get(1)?,
                            success_count: row.get(2)?,
                            total_transitions: row.get::<_, i64>(3)? as u64,
                            consecutive_trips: row.get(4)?,
                            last_failure_time: row.get(5)?,
                            last_state_change_time: row.get(6)?,
                            opened_at: row.get(7)?,
                            created_at: row.get(8)?,
                        },
                    ))
                },
            )
            .optional()?;

        match row {
            Some((state, mut snapshot)) => {
                snapshot.state = state.parse().map_err(|detail| StorageError::Corrupt {
                    table: "circuit_breaker_state",
                    detail,
                })?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    fn save_breaker(&self, s: &BreakerSnapshot) -> StorageResult<()> {
        self.conn().execute(
            r#"
            INSERT INTO circuit_breaker_state (
                id, state, failure_count, success_count, total_transitions, consecutive_trips,
                last_failure_time, last_state_change_time, opened_at, created_at
            )
            VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                state = excluded.state,
                failure_count = excluded.failure_count,
                success_count = excluded.success_count,
                total_transitions = excluded.total_transitions,
                consecutive_trips = excluded.consecutive_trips,
                last_failure_time = excluded.last_failure_time,
                last_state_change_time = excluded.last_state_change_time,
                opened_at = excluded.opened_at,
                created_at = excluded.created_at
            "#,
            params![
                s.state.as_str(),
                s.failure_count,
                s.success_count,
                s.total_transitions as i64,
                s.consecutive_trips,
                s.last_failure_time,
                s.last_state_change_time,
                s.opened_at,
                s.created_at,
            ],
        )?;
        Ok(())
    }
}
