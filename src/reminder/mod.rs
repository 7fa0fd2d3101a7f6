//! Daily habit reminders. [scheduler::ReminderScheduler] owns the timers,
//! [notifier::Notifier] abstracts how the host presents them.

pub mod notifier;
pub mod scheduler;
