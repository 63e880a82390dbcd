use storage::dto::season::{EndSeasonRequest, StartSeasonRequest};
use storage::error::StorageError;
use storage::models::Season;
use storage::repository::SeasonRepository;
use tracing::info;
use validator::Validate;

use super::LeagueService;
use crate::error::{LeagueError, OperationContext, Result};

impl LeagueService {
    /// Opens a new active season, closing whichever season was active.
    #[tracing::instrument(
        skip(self, request),
        fields(guild_id = %request.guild_id, season_id = %request.season_id)
    )]
    pub async fn start_season(&self, request: &StartSeasonRequest) -> Result<Season> {
        const OPERATION: &str = "start_season";

        request.validate()?;
        let guild_id = request.guild_id.as_str();

        let mut tx = self.begin_locked(guild_id, OPERATION).await?;
        let now = self.clock.now();

        let closed = SeasonRepository::new(&mut *tx)
            .deactivate_active(guild_id, now)
            .await
            .in_op(OPERATION)?;

        let season = SeasonRepository::new(&mut *tx)
            .create_active(guild_id, &request.season_id, &request.name, now)
            .await
            .map_err(|e| match e {
                StorageError::ConstraintViolation(message) => LeagueError::Validation(message),
                source => LeagueError::Storage {
                    operation: OPERATION,
                    source,
                },
            })?;

        tx.commit().await.in_op(OPERATION)?;

        info!(closed = closed.as_deref().unwrap_or("-"), "season started");

        Ok(season)
    }

    /// Closes an active season. Rounds processed afterwards skip points
    /// until another season starts.
    #[tracing::instrument(
        skip(self, request),
        fields(guild_id = %request.guild_id, season_id = %request.season_id)
    )]
    pub async fn end_season(&self, request: &EndSeasonRequest) -> Result<Season> {
        const OPERATION: &str = "end_season";

        request.validate()?;
        let guild_id = request.guild_id.as_str();

        let mut tx = self.begin_locked(guild_id, OPERATION).await?;
        let now = self.clock.now();

        let season = SeasonRepository::new(&mut *tx)
            .end(guild_id, &request.season_id, now)
            .await
            .in_op(OPERATION)?;

        tx.commit().await.in_op(OPERATION)?;

        info!("season ended");

        Ok(season)
    }
}
