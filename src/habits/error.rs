use thiserror::Error;

use crate::storage::entities::HabitId;

/// Recoverable conditions the user can act on. Everything else travels as [anyhow::Error].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum HabitError {
    #[error("Habit name is required")]
    EmptyName,

    #[error("Habit {0} not found")]
    NotFound(HabitId),
}
