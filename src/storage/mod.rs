//!  Storage is organized through [repository::HabitRepository] on top of a
//!  [key_value::KeyValueStore].
//!  The basic idea is:
//!   - There is a directory with one file per key.
//!   - `habits` holds the whole habit collection and is rewritten on every change.
//!   - Small per-habit keys hold the last applied progress and the next reminder.

pub mod entities;
pub mod key_value;
pub mod repository;
