//! One repository per record family. Each owns its table in the workspace
//! database; handlers borrow the connection and never hold records between
//! requests.

pub mod activities;
pub mod attendance;
pub mod expenses;
pub mod memorization;
pub mod students;
