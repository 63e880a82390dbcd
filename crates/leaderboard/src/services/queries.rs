use storage::dto::common::{PaginatedResponse, PaginationParams};
use storage::dto::tags::TagAvailability;
use storage::models::{MemberTag, Season, SeasonStanding, TagHistoryEntry};
use storage::repository::{MemberRepository, SeasonRepository, StandingRepository, TagHistoryRepository};

use super::LeagueService;
use crate::error::{LeagueError, OperationContext, Result};

// Read views. None of these take the guild lock; each observes either the
// state before or after a concurrent write, never a partial one.
impl LeagueService {
    pub async fn get_tagged_members(&self, guild_id: &str) -> Result<Vec<MemberTag>> {
        const OPERATION: &str = "get_tagged_members";

        let mut conn = self.pool.acquire().await.in_op(OPERATION)?;
        MemberRepository::new(&mut *conn)
            .tagged_members(guild_id)
            .await
            .in_op(OPERATION)
    }

    pub async fn get_member_tag(&self, guild_id: &str, member_id: &str) -> Result<Option<i32>> {
        const OPERATION: &str = "get_member_tag";

        let mut conn = self.pool.acquire().await.in_op(OPERATION)?;
        MemberRepository::new(&mut *conn)
            .tag_of(guild_id, member_id)
            .await
            .in_op(OPERATION)
    }

    pub async fn check_tag_availability(
        &self,
        guild_id: &str,
        tag_number: i32,
    ) -> Result<TagAvailability> {
        const OPERATION: &str = "check_tag_availability";

        if tag_number <= 0 {
            return Err(LeagueError::validation(format!(
                "tag number must be positive, got {}",
                tag_number
            )));
        }

        let mut conn = self.pool.acquire().await.in_op(OPERATION)?;
        let holder_id = MemberRepository::new(&mut *conn)
            .holder_of(guild_id, tag_number)
            .await
            .in_op(OPERATION)?;

        Ok(TagAvailability {
            tag_number,
            available: holder_id.is_none(),
            holder_id,
        })
    }

    pub async fn get_active_season(&self, guild_id: &str) -> Result<Option<Season>> {
        const OPERATION: &str = "get_active_season";

        let mut conn = self.pool.acquire().await.in_op(OPERATION)?;
        SeasonRepository::new(&mut *conn)
            .active(guild_id)
            .await
            .in_op(OPERATION)
    }

    pub async fn list_seasons(&self, guild_id: &str) -> Result<Vec<Season>> {
        const OPERATION: &str = "list_seasons";

        let mut conn = self.pool.acquire().await.in_op(OPERATION)?;
        SeasonRepository::new(&mut *conn)
            .list(guild_id)
            .await
            .in_op(OPERATION)
    }

    /// Standings ordered by points; defaults to the active season.
    pub async fn get_season_standings(
        &self,
        guild_id: &str,
        season_id: Option<&str>,
        pagination: &PaginationParams,
    ) -> Result<PaginatedResponse<SeasonStanding>> {
        const OPERATION: &str = "get_season_standings";

        pagination.validate().map_err(LeagueError::Validation)?;

        let mut conn = self.pool.acquire().await.in_op(OPERATION)?;

        let season_id = match season_id {
            Some(id) => {
                SeasonRepository::new(&mut *conn)
                    .find(guild_id, id)
                    .await
                    .in_op(OPERATION)?
                    .id
            }
            None => SeasonRepository::new(&mut *conn)
                .active(guild_id)
                .await
                .in_op(OPERATION)?
                .map(|season| season.id)
                .ok_or_else(|| {
                    LeagueError::validation("no active season; pass a season id explicitly")
                })?,
        };

        let total_items = StandingRepository::new(&mut *conn)
            .population(guild_id, &season_id)
            .await
            .in_op(OPERATION)?;

        let standings = StandingRepository::new(&mut *conn)
            .list(
                guild_id,
                &season_id,
                i64::from(pagination.limit()),
                i64::from(pagination.offset()),
            )
            .await
            .in_op(OPERATION)?;

        Ok(PaginatedResponse::new(standings, pagination, total_items))
    }

    /// Ledger entries newest first, optionally limited to one member.
    pub async fn get_tag_history(
        &self,
        guild_id: &str,
        member_id: Option<&str>,
        pagination: &PaginationParams,
    ) -> Result<PaginatedResponse<TagHistoryEntry>> {
        const OPERATION: &str = "get_tag_history";

        pagination.validate().map_err(LeagueError::Validation)?;

        let mut conn = self.pool.acquire().await.in_op(OPERATION)?;

        let total_items = TagHistoryRepository::new(&mut *conn)
            .count(guild_id, member_id)
            .await
            .in_op(OPERATION)?;

        let entries = TagHistoryRepository::new(&mut *conn)
            .list(
                guild_id,
                member_id,
                i64::from(pagination.limit()),
                i64::from(pagination.offset()),
            )
            .await
            .in_op(OPERATION)?;

        Ok(PaginatedResponse::new(entries, pagination, total_items))
    }
}
