//! Subsystems exposed on the command line.

pub mod dm;
pub mod users;
