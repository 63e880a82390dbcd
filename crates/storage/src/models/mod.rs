pub mod member;
pub mod point_history;
pub mod round_outcome;
pub mod season;
pub mod standing;
pub mod tag_history;
pub mod tier;

pub use member::{LeagueMember, MemberTag};
pub use point_history::{NewPointHistory, PointHistory};
pub use round_outcome::RoundOutcome;
pub use season::Season;
pub use standing::SeasonStanding;
pub use tag_history::{NewTagHistoryEntry, TagChangeMetadata, TagChangeReason, TagHistoryEntry};
pub use tier::{ParseEnumError, Tier};
