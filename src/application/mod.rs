//! Application services orchestrating domain rules over repository adapters.

pub mod audit;
pub mod context;
pub mod error;
pub mod repos;
pub mod snapshots;
