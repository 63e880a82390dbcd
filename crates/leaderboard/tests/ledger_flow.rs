use std::sync::Arc;

use chrono::{TimeZone, Utc};
use leaderboard::{FixedClock, LeagueError, LeagueService};
use sqlx::PgPool;
use storage::dto::assignment::{
    ApplyTagAssignmentsRequest, AssignmentSource, ResetTagsRequest, TagAssignment,
};
use storage::dto::common::PaginationParams;
use storage::dto::round::{ProcessRoundRequest, RoundParticipant};
use storage::dto::season::{EndSeasonRequest, StartSeasonRequest};
use storage::error::StorageError;
use storage::models::{TagChangeMetadata, TagChangeReason};
use uuid::Uuid;

const GUILD: &str = "g1";

fn service(pool: PgPool) -> LeagueService {
    let start = Utc.with_ymd_and_hms(2026, 6, 12, 9, 30, 0).unwrap();
    LeagueService::new(pool).with_clock(Arc::new(FixedClock::new(start)))
}

async fn seed_tags(service: &LeagueService, order: &[&str]) {
    service
        .reset_tags(&ResetTagsRequest {
            guild_id: GUILD.to_string(),
            finish_order: order.iter().map(|m| m.to_string()).collect(),
        })
        .await
        .unwrap();
}

fn assignments(source: AssignmentSource, pairs: &[(&str, i32)]) -> ApplyTagAssignmentsRequest {
    ApplyTagAssignmentsRequest {
        guild_id: GUILD.to_string(),
        requests: pairs
            .iter()
            .map(|(member_id, tag_number)| TagAssignment {
                member_id: member_id.to_string(),
                tag_number: *tag_number,
            })
            .collect(),
        source,
        update_id: Uuid::new_v4(),
    }
}

fn start(season_id: &str) -> StartSeasonRequest {
    StartSeasonRequest {
        guild_id: GUILD.to_string(),
        season_id: season_id.to_string(),
        name: format!("Season {}", season_id),
    }
}

#[sqlx::test(migrations = "../storage/migrations")]
#[ignore] // Only run when Postgres is available via DATABASE_URL
async fn test_claiming_a_held_tag_needs_swap(pool: PgPool) {
    let service = service(pool);
    seed_tags(&service, &["a", "b", "c"]).await;

    let err = service
        .apply_tag_assignments(&assignments(AssignmentSource::Claim, &[("d", 1)]))
        .await
        .unwrap_err();

    match err {
        LeagueError::TagSwapNeeded(swap) => {
            assert_eq!(swap.requestor_id, "d");
            assert_eq!(swap.current_holder_id, "a");
            assert_eq!(swap.target_tag, 1);
            assert_eq!(swap.requestor_current_tag, None);
        }
        other => panic!("expected TagSwapNeeded, got {:?}", other),
    }

    // Nothing moved.
    assert_eq!(service.get_member_tag(GUILD, "a").await.unwrap(), Some(1));
    assert_eq!(service.get_member_tag(GUILD, "d").await.unwrap(), None);
}

#[sqlx::test(migrations = "../storage/migrations")]
#[ignore] // Only run when Postgres is available via DATABASE_URL
async fn test_swap_inside_batch_is_atomic(pool: PgPool) {
    let service = service(pool);
    seed_tags(&service, &["a", "b", "c"]).await;

    let snapshot = service
        .apply_tag_assignments(&assignments(AssignmentSource::Admin, &[("a", 2), ("b", 1)]))
        .await
        .unwrap();

    let tags: Vec<(String, i32)> = snapshot
        .tags
        .iter()
        .map(|m| (m.member_id.clone(), m.tag_number))
        .collect();
    assert_eq!(
        tags,
        vec![
            ("b".to_string(), 1),
            ("a".to_string(), 2),
            ("c".to_string(), 3)
        ]
    );
    assert_eq!(snapshot.changes.len(), 2);

    let history = service
        .get_tag_history(GUILD, Some("b"), &PaginationParams::default())
        .await
        .unwrap();
    let latest = &history.data[0];
    assert_eq!(latest.reason, TagChangeReason::AdminFix);
    assert!(matches!(latest.metadata, TagChangeMetadata::Assignment { .. }));
}

#[sqlx::test(migrations = "../storage/migrations")]
#[ignore] // Only run when Postgres is available via DATABASE_URL
async fn test_claiming_a_free_tag(pool: PgPool) {
    let service = service(pool);
    seed_tags(&service, &["a", "b"]).await;

    let snapshot = service
        .apply_tag_assignments(&assignments(AssignmentSource::Claim, &[("d", 7)]))
        .await
        .unwrap();

    assert_eq!(snapshot.changes.len(), 1);
    assert_eq!(snapshot.changes[0].old_member_id, None);
    assert_eq!(service.get_member_tag(GUILD, "d").await.unwrap(), Some(7));

    let availability = service.check_tag_availability(GUILD, 7).await.unwrap();
    assert!(!availability.available);
    assert_eq!(availability.holder_id.as_deref(), Some("d"));
    assert!(service.check_tag_availability(GUILD, 3).await.unwrap().available);
    assert!(matches!(
        service.check_tag_availability(GUILD, 0).await,
        Err(LeagueError::Validation(_))
    ));
}

#[sqlx::test(migrations = "../storage/migrations")]
#[ignore] // Only run when Postgres is available via DATABASE_URL
async fn test_reset_reseeds_every_tag(pool: PgPool) {
    let service = service(pool);
    seed_tags(&service, &["a", "b", "c"]).await;
    service
        .apply_tag_assignments(&assignments(AssignmentSource::Claim, &[("d", 9)]))
        .await
        .unwrap();

    let changes = service
        .reset_tags(&ResetTagsRequest {
            guild_id: GUILD.to_string(),
            finish_order: vec!["c".to_string(), "a".to_string()],
        })
        .await
        .unwrap();

    let tags: Vec<(String, i32)> = service
        .get_tagged_members(GUILD)
        .await
        .unwrap()
        .into_iter()
        .map(|m| (m.member_id, m.tag_number))
        .collect();
    assert_eq!(tags, vec![("c".to_string(), 1), ("a".to_string(), 2)]);
    assert_eq!(changes.len(), 2);
    assert_eq!(service.get_member_tag(GUILD, "d").await.unwrap(), None);

    let history = service
        .get_tag_history(GUILD, Some("c"), &PaginationParams::default())
        .await
        .unwrap();
    let latest = &history.data[0];
    assert_eq!(latest.reason, TagChangeReason::Reset);
    assert_eq!(latest.tag_number, 1);
    assert_eq!(latest.metadata, TagChangeMetadata::reset());
}

#[sqlx::test(migrations = "../storage/migrations")]
#[ignore] // Only run when Postgres is available via DATABASE_URL
async fn test_at_most_one_active_season(pool: PgPool) {
    let service = service(pool);

    service.start_season(&start("s1")).await.unwrap();
    service.start_season(&start("s2")).await.unwrap();

    let seasons = service.list_seasons(GUILD).await.unwrap();
    assert_eq!(seasons.len(), 2);
    assert_eq!(seasons.iter().filter(|s| s.is_active).count(), 1);
    assert_eq!(service.get_active_season(GUILD).await.unwrap().unwrap().id, "s2");

    assert!(matches!(
        service.start_season(&start("s1")).await,
        Err(LeagueError::Validation(_))
    ));
    // The failed start rolled back, so s2 is still active.
    assert_eq!(service.get_active_season(GUILD).await.unwrap().unwrap().id, "s2");

    let ended = service
        .end_season(&EndSeasonRequest {
            guild_id: GUILD.to_string(),
            season_id: "s2".to_string(),
        })
        .await
        .unwrap();
    assert!(!ended.is_active);
    assert!(ended.end_date.is_some());

    let err = service
        .end_season(&EndSeasonRequest {
            guild_id: GUILD.to_string(),
            season_id: "s2".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LeagueError::Storage {
            source: StorageError::NotFound,
            ..
        }
    ));
}

#[sqlx::test(migrations = "../storage/migrations")]
#[ignore] // Only run when Postgres is available via DATABASE_URL
async fn test_standings_default_to_active_season(pool: PgPool) {
    let service = service(pool);
    seed_tags(&service, &["a", "b", "c", "d"]).await;

    assert!(matches!(
        service
            .get_season_standings(GUILD, None, &PaginationParams::default())
            .await,
        Err(LeagueError::Validation(_))
    ));

    service.start_season(&start("s1")).await.unwrap();
    service
        .process_round(&ProcessRoundRequest {
            guild_id: GUILD.to_string(),
            round_id: Uuid::new_v4(),
            participants: ["d", "c", "b", "a"]
                .iter()
                .enumerate()
                .map(|(i, m)| RoundParticipant {
                    member_id: m.to_string(),
                    finish_rank: i as i32 + 1,
                })
                .collect(),
        })
        .await
        .unwrap();

    let page = PaginationParams {
        page: 1,
        page_size: 2,
    };
    let standings = service.get_season_standings(GUILD, None, &page).await.unwrap();

    assert_eq!(standings.pagination.total_items, 4);
    assert_eq!(standings.pagination.total_pages, 2);
    assert_eq!(standings.data.len(), 2);
    // Four members: tag 1 is Gold, tag 2 Silver, the rest Bronze. c and b
    // tie on 2 points and the better season-best tag sorts first.
    let top: Vec<(&str, i32)> = standings
        .data
        .iter()
        .map(|s| (s.member_id.as_str(), s.total_points))
        .collect();
    assert_eq!(top, vec![("c", 2), ("b", 2)]);

    let explicit = service
        .get_season_standings(GUILD, Some("s1"), &page)
        .await
        .unwrap();
    assert_eq!(explicit.pagination.total_items, 4);

    assert!(matches!(
        service
            .get_season_standings(GUILD, Some("nope"), &page)
            .await,
        Err(LeagueError::Storage {
            source: StorageError::NotFound,
            ..
        })
    ));
}
