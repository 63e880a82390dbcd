pub mod allocation;
pub mod assignment;
pub mod clock;
pub mod config;
pub mod error;
pub mod hashing;
pub mod idempotency;
pub mod scoring;
pub mod season;
pub mod services;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Config, EngineSettings, LockStrategy};
pub use error::{LeagueError, Result, TagSwapNeeded};
pub use services::{LeagueService, RollbackSummary};
