pub mod activities;
pub mod analytics;
pub mod attendance;
pub mod core;
pub mod expenses;
pub mod memorization;
pub mod setup;
pub mod students;
