//! Replay and recalculation decisions for a round submission.

use chrono::{DateTime, Duration, Utc};
use storage::models::RoundOutcome;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundDecision {
    /// Never processed before.
    Fresh,
    /// Same inputs as the stored outcome; return persisted state untouched.
    Replay { season_id: Option<String> },
    /// Different inputs inside the window; roll back points then reprocess.
    Recalculate { previous_season_id: Option<String> },
    /// Different inputs after the window closed.
    Stale { processed_at: DateTime<Utc> },
}

pub fn decide(
    existing: Option<&RoundOutcome>,
    processing_hash: &str,
    now: DateTime<Utc>,
    recalculation_window: Duration,
) -> RoundDecision {
    let Some(outcome) = existing else {
        return RoundDecision::Fresh;
    };

    if outcome.processing_hash == processing_hash {
        return RoundDecision::Replay {
            season_id: outcome.season_id.clone(),
        };
    }

    if now - outcome.processed_at <= recalculation_window {
        RoundDecision::Recalculate {
            previous_season_id: outcome.season_id.clone(),
        }
    } else {
        RoundDecision::Stale {
            processed_at: outcome.processed_at,
        }
    }
}
