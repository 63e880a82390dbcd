use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgConnection;
use storage::repository::{PointHistoryRepository, StandingRepository};
use tracing::debug;
use uuid::Uuid;

use crate::error::{OperationContext, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RollbackSummary {
    pub rows_removed: u64,
    pub points_removed: i64,
}

/// Reverses the point effects of a previous processing of `round_id`.
///
/// Each history row is reverted on the standing of the season it was
/// recorded against: points and rounds come off, the season-best tag and
/// tier return to their pre-round values, and standings the round created
/// are removed. Then exactly those rows are deleted. Tag state is not
/// touched.
pub(crate) async fn rollback_round_points(
    conn: &mut PgConnection,
    guild_id: &str,
    round_id: Uuid,
    now: DateTime<Utc>,
    operation: &'static str,
) -> Result<RollbackSummary> {
    let rows = PointHistoryRepository::new(&mut *conn)
        .for_round(guild_id, round_id)
        .await
        .in_op(operation)?;

    if rows.is_empty() {
        return Ok(RollbackSummary::default());
    }

    let mut points_removed = 0i64;
    for row in &rows {
        StandingRepository::new(&mut *conn)
            .revert_round(row, now)
            .await
            .in_op(operation)?;
        points_removed += i64::from(row.points);
    }

    let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
    let rows_removed = PointHistoryRepository::new(&mut *conn)
        .delete(guild_id, &ids)
        .await
        .in_op(operation)?;

    debug!(guild_id, %round_id, rows_removed, points_removed, "rolled back round points");

    Ok(RollbackSummary {
        rows_removed,
        points_removed,
    })
}
