pub mod analysis;
pub mod location;
pub mod registry;
pub mod schedule;
