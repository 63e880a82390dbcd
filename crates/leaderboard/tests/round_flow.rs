use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use leaderboard::{FixedClock, LeagueError, LeagueService};
use sqlx::PgPool;
use storage::RowGuildLock;
use storage::dto::assignment::ResetTagsRequest;
use storage::dto::round::{ProcessRoundRequest, ProcessRoundResult, RoundParticipant};
use storage::dto::season::{EndSeasonRequest, StartSeasonRequest};
use storage::models::Tier;
use storage::repository::{PointHistoryRepository, StandingRepository, TagHistoryRepository};
use uuid::Uuid;

const GUILD: &str = "g1";

fn service(pool: PgPool) -> (LeagueService, Arc<FixedClock>) {
    let start = Utc.with_ymd_and_hms(2026, 5, 1, 18, 0, 0).unwrap();
    let clock = Arc::new(FixedClock::new(start));
    let service = LeagueService::new(pool).with_clock(clock.clone());
    (service, clock)
}

fn round(round_id: Uuid, order: &[&str]) -> ProcessRoundRequest {
    ProcessRoundRequest {
        guild_id: GUILD.to_string(),
        round_id,
        participants: order
            .iter()
            .enumerate()
            .map(|(i, member_id)| RoundParticipant {
                member_id: member_id.to_string(),
                finish_rank: i as i32 + 1,
            })
            .collect(),
    }
}

fn tag(result: &ProcessRoundResult, member_id: &str) -> Option<i32> {
    result
        .final_tags
        .iter()
        .find(|p| p.member_id == member_id)
        .and_then(|p| p.tag_number)
}

fn points(result: &ProcessRoundResult, member_id: &str) -> i32 {
    result
        .awards
        .iter()
        .find(|a| a.member_id == member_id)
        .map(|a| a.points)
        .unwrap()
}

async fn seed_league(service: &LeagueService) {
    service
        .reset_tags(&ResetTagsRequest {
            guild_id: GUILD.to_string(),
            finish_order: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        })
        .await
        .unwrap();

    service
        .start_season(&StartSeasonRequest {
            guild_id: GUILD.to_string(),
            season_id: "s1".to_string(),
            name: "Spring".to_string(),
        })
        .await
        .unwrap();
}

#[sqlx::test(migrations = "../storage/migrations")]
#[ignore] // Only run when Postgres is available via DATABASE_URL
async fn test_round_swaps_tags_and_scores(pool: PgPool) {
    let (service, _clock) = service(pool.clone());
    seed_league(&service).await;

    let round_id = Uuid::new_v4();
    let result = service.process_round(&round(round_id, &["b", "a", "c"])).await.unwrap();

    assert!(!result.was_idempotent);
    assert!(!result.recalculated);
    assert_eq!(result.season_id.as_deref(), Some("s1"));
    assert_eq!(tag(&result, "b"), Some(1));
    assert_eq!(tag(&result, "a"), Some(2));
    assert_eq!(tag(&result, "c"), Some(3));

    // c keeps tag 3, so only tags 1 and 2 change hands.
    let mut conn = pool.acquire().await.unwrap();
    let ledger = TagHistoryRepository::new(&mut conn)
        .for_round(GUILD, round_id)
        .await
        .unwrap();
    assert_eq!(ledger.len(), 2);
    assert!(ledger.iter().all(|e| e.reason.as_str() == "round_swap"));

    // Population 3: tag 1 is Gold, tag 2 Silver, tag 3 Bronze.
    assert_eq!(points(&result, "b"), 1);
    assert_eq!(points(&result, "a"), 1);
    assert_eq!(points(&result, "c"), 0);
    let b = result.awards.iter().find(|a| a.member_id == "b").unwrap();
    assert_eq!(b.tier, Tier::Gold);
    assert_eq!(b.opponents_beaten, 2);

    assert_eq!(service.get_member_tag(GUILD, "b").await.unwrap(), Some(1));
}

#[sqlx::test(migrations = "../storage/migrations")]
#[ignore] // Only run when Postgres is available via DATABASE_URL
async fn test_identical_resubmission_is_idempotent(pool: PgPool) {
    let (service, clock) = service(pool.clone());
    seed_league(&service).await;

    let round_id = Uuid::new_v4();
    let first = service.process_round(&round(round_id, &["b", "a", "c"])).await.unwrap();

    clock.advance(Duration::hours(30));
    let second = service.process_round(&round(round_id, &["b", "a", "c"])).await.unwrap();

    assert!(second.was_idempotent);
    assert!(second.tag_changes.is_empty());
    assert_eq!(first.final_tags, second.final_tags);
    assert_eq!(first.awards, second.awards);

    let mut conn = pool.acquire().await.unwrap();
    let ledger = TagHistoryRepository::new(&mut conn)
        .for_round(GUILD, round_id)
        .await
        .unwrap();
    assert_eq!(ledger.len(), 2);
    let history = PointHistoryRepository::new(&mut conn)
        .for_round(GUILD, round_id)
        .await
        .unwrap();
    assert_eq!(history.len(), 3);
}

#[sqlx::test(migrations = "../storage/migrations")]
#[ignore] // Only run when Postgres is available via DATABASE_URL
async fn test_changed_results_recalculate_inside_window(pool: PgPool) {
    let (service, clock) = service(pool.clone());
    seed_league(&service).await;

    let round_id = Uuid::new_v4();
    service.process_round(&round(round_id, &["b", "a", "c"])).await.unwrap();

    clock.advance(Duration::minutes(2));
    let result = service.process_round(&round(round_id, &["a", "b", "c"])).await.unwrap();

    assert!(result.recalculated);
    assert!(!result.was_idempotent);
    assert_eq!(tag(&result, "a"), Some(1));
    assert_eq!(tag(&result, "b"), Some(2));
    // The superseded processing's best tags are gone: b is back to a
    // season-best of 2 (Silver) and a holds 1 (Gold).
    assert_eq!(points(&result, "a"), 1);
    assert_eq!(points(&result, "b"), 1);

    let mut conn = pool.acquire().await.unwrap();
    let history = PointHistoryRepository::new(&mut conn)
        .for_round(GUILD, round_id)
        .await
        .unwrap();
    assert_eq!(history.len(), 3);

    let members: Vec<String> = ["a", "b", "c"].iter().map(|m| m.to_string()).collect();
    let standings = StandingRepository::new(&mut conn)
        .find_many(GUILD, "s1", &members)
        .await
        .unwrap();
    let total = |member: &str| {
        standings
            .iter()
            .find(|s| s.member_id == member)
            .map(|s| (s.total_points, s.rounds_played))
            .unwrap()
    };
    assert_eq!(total("a"), (1, 1));
    assert_eq!(total("b"), (1, 1));
    assert_eq!(total("c"), (0, 1));
}

#[sqlx::test(migrations = "../storage/migrations")]
#[ignore] // Only run when Postgres is available via DATABASE_URL
async fn test_changed_results_after_window_are_stale(pool: PgPool) {
    let (service, clock) = service(pool.clone());
    seed_league(&service).await;

    let round_id = Uuid::new_v4();
    service.process_round(&round(round_id, &["b", "a", "c"])).await.unwrap();

    clock.advance(Duration::hours(25));
    let err = service
        .process_round(&round(round_id, &["a", "b", "c"]))
        .await
        .unwrap_err();

    assert!(matches!(err, LeagueError::StaleRecalculation { .. }));
    assert_eq!(service.get_member_tag(GUILD, "b").await.unwrap(), Some(1));
}

#[sqlx::test(migrations = "../storage/migrations")]
#[ignore] // Only run when Postgres is available via DATABASE_URL
async fn test_round_without_season_skips_points(pool: PgPool) {
    let (service, _clock) = service(pool);
    service
        .reset_tags(&ResetTagsRequest {
            guild_id: GUILD.to_string(),
            finish_order: vec!["a".to_string(), "b".to_string()],
        })
        .await
        .unwrap();

    let result = service
        .process_round(&round(Uuid::new_v4(), &["b", "a", "newbie"]))
        .await
        .unwrap();

    assert!(result.points_skipped);
    assert!(result.awards.is_empty());
    assert_eq!(result.season_id, None);
    assert_eq!(tag(&result, "b"), Some(1));
    assert_eq!(tag(&result, "newbie"), None);
}

#[sqlx::test(migrations = "../storage/migrations")]
#[ignore] // Only run when Postgres is available via DATABASE_URL
async fn test_recalculation_falls_back_to_original_season(pool: PgPool) {
    let (service, clock) = service(pool.clone());
    seed_league(&service).await;

    let round_id = Uuid::new_v4();
    service.process_round(&round(round_id, &["b", "a", "c"])).await.unwrap();

    service
        .end_season(&EndSeasonRequest {
            guild_id: GUILD.to_string(),
            season_id: "s1".to_string(),
        })
        .await
        .unwrap();

    clock.advance(Duration::minutes(5));
    let result = service.process_round(&round(round_id, &["c", "b", "a"])).await.unwrap();

    assert!(result.recalculated);
    assert!(!result.points_skipped);
    assert_eq!(result.season_id.as_deref(), Some("s1"));

    // A fresh round with no active season scores nowhere.
    let fresh = service.process_round(&round(Uuid::new_v4(), &["a", "b"])).await.unwrap();
    assert!(fresh.points_skipped);

    let mut conn = pool.acquire().await.unwrap();
    let history = PointHistoryRepository::new(&mut conn)
        .for_round(GUILD, round_id)
        .await
        .unwrap();
    assert_eq!(history.len(), 3);
    assert!(history.iter().all(|row| row.season_id == "s1"));
}

#[sqlx::test(migrations = "../storage/migrations")]
#[ignore] // Only run when Postgres is available via DATABASE_URL
async fn test_concurrent_rounds_serialize_under_row_lock(pool: PgPool) {
    let (service, _clock) = service(pool);
    let service = service.with_lock(Arc::new(RowGuildLock));
    seed_league(&service).await;

    let first = round(Uuid::new_v4(), &["c", "b", "a"]);
    let second = round(Uuid::new_v4(), &["b", "c", "a"]);
    let (r1, r2) = tokio::join!(service.process_round(&first), service.process_round(&second));
    r1.unwrap();
    r2.unwrap();

    let mut tags: Vec<i32> = service
        .get_tagged_members(GUILD)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.tag_number)
        .collect();
    tags.sort_unstable();
    assert_eq!(tags, vec![1, 2, 3]);
}

async fn standings_snapshot(pool: &PgPool, members: &[&str]) -> Vec<(String, i32, i32, Option<i32>, Tier)> {
    let members: Vec<String> = members.iter().map(|m| m.to_string()).collect();
    let mut conn = pool.acquire().await.unwrap();
    StandingRepository::new(&mut conn)
        .find_many(GUILD, "s1", &members)
        .await
        .unwrap()
        .into_iter()
        .map(|s| {
            (
                s.member_id,
                s.total_points,
                s.rounds_played,
                s.season_best_tag,
                s.current_tier,
            )
        })
        .collect()
}

#[sqlx::test(migrations = "../storage/migrations")]
#[ignore] // Only run when Postgres is available via DATABASE_URL
async fn test_recalculation_cycle_restores_standings_exactly(pool: PgPool) {
    let (service, clock) = service(pool.clone());
    let members = ["a", "b", "c", "d", "e"];
    service
        .reset_tags(&ResetTagsRequest {
            guild_id: GUILD.to_string(),
            finish_order: members.iter().map(|m| m.to_string()).collect(),
        })
        .await
        .unwrap();
    service
        .start_season(&StartSeasonRequest {
            guild_id: GUILD.to_string(),
            season_id: "s1".to_string(),
            name: "Spring".to_string(),
        })
        .await
        .unwrap();

    // c, d and e already hold standings before the round under test; a and
    // b are enrolled by it.
    service
        .process_round(&round(Uuid::new_v4(), &["c", "d", "e"]))
        .await
        .unwrap();

    let round_id = Uuid::new_v4();
    let first = service.process_round(&round(round_id, &["b", "a", "c", "d", "e"])).await.unwrap();
    let before = standings_snapshot(&pool, &members).await;

    // The superseded processing hands c a season-best of 1.
    clock.advance(Duration::minutes(1));
    let detour = service.process_round(&round(round_id, &["c", "a", "b", "d", "e"])).await.unwrap();
    assert!(detour.recalculated);
    assert_eq!(tag(&detour, "c"), Some(1));

    clock.advance(Duration::minutes(1));
    let back = service.process_round(&round(round_id, &["b", "a", "c", "d", "e"])).await.unwrap();
    assert!(back.recalculated);

    assert_eq!(first.final_tags, back.final_tags);
    assert_eq!(first.awards, back.awards);
    assert_eq!(standings_snapshot(&pool, &members).await, before);
}

#[sqlx::test(migrations = "../storage/migrations")]
#[ignore] // Only run when Postgres is available via DATABASE_URL
async fn test_rollback_removes_standings_the_round_created(pool: PgPool) {
    let (service, clock) = service(pool.clone());
    seed_league(&service).await;

    let round_id = Uuid::new_v4();
    service.process_round(&round(round_id, &["b", "a", "c"])).await.unwrap();

    // Recalculated without c: c's standing existed only because of this round.
    clock.advance(Duration::minutes(1));
    service.process_round(&round(round_id, &["a", "b"])).await.unwrap();

    let mut conn = pool.acquire().await.unwrap();
    assert_eq!(StandingRepository::new(&mut conn).population(GUILD, "s1").await.unwrap(), 2);
}

#[sqlx::test(migrations = "../storage/migrations")]
#[ignore] // Only run when Postgres is available via DATABASE_URL
async fn test_concurrent_rounds_under_advisory_lock(pool: PgPool) {
    let (service, _clock) = service(pool.clone());
    let members = ["a", "b", "c", "d", "e", "f", "g"];
    service
        .reset_tags(&ResetTagsRequest {
            guild_id: GUILD.to_string(),
            finish_order: members.iter().map(|m| m.to_string()).collect(),
        })
        .await
        .unwrap();
    service
        .start_season(&StartSeasonRequest {
            guild_id: GUILD.to_string(),
            season_id: "s1".to_string(),
            name: "Spring".to_string(),
        })
        .await
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = service.clone();
            let order: Vec<&str> = members.iter().cycle().skip(i * 3).take(4 + i % 3).copied().collect();
            let request = round(Uuid::new_v4(), &order);
            tokio::spawn(async move { service.process_round(&request).await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let mut tags: Vec<i32> = service
        .get_tagged_members(GUILD)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.tag_number)
        .collect();
    tags.sort_unstable();
    assert_eq!(tags, (1..=7).collect::<Vec<_>>());

    let history: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT member_id, SUM(points)::BIGINT
        FROM point_history
        WHERE guild_id = $1 AND season_id = 's1'
        GROUP BY member_id
        ORDER BY member_id
        "#,
    )
    .bind(GUILD)
    .fetch_all(&pool)
    .await
    .unwrap();

    let mut conn = pool.acquire().await.unwrap();
    let standings: Vec<(String, i64)> = StandingRepository::new(&mut conn)
        .list(GUILD, "s1", 100, 0)
        .await
        .unwrap()
        .into_iter()
        .map(|s| (s.member_id, i64::from(s.total_points)))
        .collect::<std::collections::BTreeMap<_, _>>()
        .into_iter()
        .collect();

    assert_eq!(history, standings);
}
