pub mod member;
pub mod point_history;
pub mod round_outcome;
pub mod season;
pub mod standing;
pub mod tag_history;

pub use member::{MemberRepository, TagMove};
pub use point_history::PointHistoryRepository;
pub use round_outcome::RoundOutcomeRepository;
pub use season::SeasonRepository;
pub use standing::{StandingRepository, StandingUpdate};
pub use tag_history::TagHistoryRepository;
