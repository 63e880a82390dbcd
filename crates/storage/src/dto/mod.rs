pub mod assignment;
pub mod common;
pub mod round;
pub mod season;
pub mod tags;
