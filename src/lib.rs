//! Local habit tracker. Habits, their progress log and reminder state live in plain json files,
//! the cli edits them and a small daemon shows the daily reminders.
//!

pub mod cli;
pub mod config;
pub mod daemon;
pub mod habits;
pub mod reminder;
pub mod storage;
pub mod streak;
pub mod utils;
