use anyhow::Result;
use chrono::Local;
use clap::Subcommand;

use crate::{
    habits::service::{HabitService, HabitView, ReminderChange},
    storage::{
        entities::{HabitEntity, HabitId, ProgressEntry},
        key_value::KeyValueStore,
    },
    utils::{progress::Progress, time::format_date},
};

use super::date::{parse_day, DateStyle};

#[derive(Subcommand, Debug)]
pub enum HabitCommand {
    #[command(about = "Create a habit")]
    Add {
        name: String,
        #[arg(long, help = "Daily reminder time as HH:MM")]
        remind: Option<String>,
    },
    #[command(about = "Rename a habit or change its reminder")]
    Edit {
        id: HabitId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, help = "Daily reminder time as HH:MM", conflicts_with = "no_remind")]
        remind: Option<String>,
        #[arg(long = "no-remind", help = "Turn the reminder off")]
        no_remind: bool,
    },
    #[command(about = "Log progress for a day, 100 marks the habit complete")]
    Progress {
        id: HabitId,
        #[arg(help = "Progress between 0 and 100, a trailing % is allowed")]
        value: Progress,
        #[arg(
            long,
            help = "Day the progress belongs to. Examples are \"yesterday\", \"2 days ago\", \"15/03/2025\". Today by default"
        )]
        date: Option<String>,
        #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
        date_style: DateStyle,
    },
    #[command(about = "List all habits")]
    List,
    #[command(about = "Show a single habit")]
    Show { id: HabitId },
    #[command(about = "Print the progress log of a habit")]
    History { id: HabitId },
    #[command(about = "Delete a habit")]
    Delete { id: HabitId },
}

pub async fn process_habit_command<S: KeyValueStore>(
    command: HabitCommand,
    service: &HabitService<S>,
) -> Result<()> {
    match command {
        HabitCommand::Add { name, remind } => {
            let reminder = remind.map(|v| v.parse()).transpose()?;
            let habit = service.create(&name, reminder).await?;
            println!("Habit created successfully");
            println!("{}", format_summary(&habit));
        }
        HabitCommand::Edit {
            id,
            name,
            remind,
            no_remind,
        } => {
            let reminder = match (remind, no_remind) {
                (Some(time), _) => ReminderChange::Set(time.parse()?),
                (None, true) => ReminderChange::Disable,
                (None, false) => ReminderChange::Keep,
            };
            let habit = service.edit(id, name.as_deref(), reminder).await?;
            println!("Habit updated successfully");
            println!("{}", format_summary(&habit));
        }
        HabitCommand::Progress {
            id,
            value,
            date,
            date_style,
        } => {
            let date = date
                .map(|v| parse_day(&v, Local::now(), date_style))
                .transpose()?;
            let outcome = service.update_progress(id, value, date).await?;
            println!("Progress updated successfully");
            println!("Streak\t{}", format_streak(outcome.habit.streak));
            if let Some(milestone) = outcome.new_milestone {
                println!("{}", milestone_message(&outcome.habit.name, milestone));
            }
        }
        HabitCommand::List => {
            let views = service.list().await?;
            if views.is_empty() {
                println!("No habits yet. Create one with `dailystreak add <name>`");
            }
            for view in views {
                println!("{}", format_row(&view));
            }
        }
        HabitCommand::Show { id } => {
            let view = service.get(id).await?;
            print!("{}", format_details(&view));
        }
        HabitCommand::History { id } => {
            let view = service.get(id).await?;
            if view.habit.progress_log.is_empty() {
                println!(
                    "No progress data available. Log some with `dailystreak progress {id} <value>`"
                );
            }
            for entry in &view.habit.progress_log {
                println!("{}", format_history_row(entry));
            }
        }
        HabitCommand::Delete { id } => {
            service.delete(id).await?;
            println!("Habit deleted successfully");
        }
    }
    Ok(())
}

pub fn milestone_message(name: &str, milestone: u32) -> String {
    format!("🎉 {name} reached a {milestone}-day streak!")
}

fn format_streak(streak: u32) -> String {
    match streak {
        1 => "1 day".to_string(),
        v => format!("{v} days"),
    }
}

fn format_reminder(habit: &HabitEntity) -> String {
    habit
        .active_reminder()
        .map_or_else(|| "off".to_string(), |time| time.to_string())
}

fn format_summary(habit: &HabitEntity) -> String {
    format!(
        "{}\t{}\treminder {}",
        habit.id,
        habit.name,
        format_reminder(habit)
    )
}

fn format_row(view: &HabitView) -> String {
    let marker = if view.incomplete_today { "!" } else { " " };
    format!(
        "{marker} {}\t{}\t{}\t{}\treminder {}",
        view.habit.id,
        view.habit.name,
        format_streak(view.habit.streak),
        view.habit.progress,
        format_reminder(&view.habit)
    )
}

fn format_details(view: &HabitView) -> String {
    let habit = &view.habit;
    let completion = view
        .last_progress_update
        .unwrap_or_default()
        .to_string();
    let milestones = habit
        .milestone_shown
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>();
    let milestones = if milestones.is_empty() {
        "none".to_string()
    } else {
        milestones.join(", ")
    };
    let mut details = format!("{}\n", habit.name);
    details += &format!("Id\t\t{}\n", habit.id);
    details += &format!("Streak\t\t{}\n", format_streak(habit.streak));
    details += &format!("Completion Rate\t{completion}\n");
    details += &format!("Reminder\t{}\n", format_reminder(habit));
    details += &format!("Milestones\t{milestones}\n");
    if view.incomplete_today {
        details += "Not completed today\n";
    }
    details
}

const BAR_WIDTH: usize = 20;

/// Text stand-in for the progress chart, one row per entry.
fn format_history_row(entry: &ProgressEntry) -> String {
    let filled = *entry.progress as usize * BAR_WIDTH / 100;
    format!(
        "{}\t{}{}\t{}",
        format_date(entry.date),
        "#".repeat(filled),
        ".".repeat(BAR_WIDTH - filled),
        entry.progress
    )
}
