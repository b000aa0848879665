//! Deadline reminder job.
//!
//! One daily run: active cycles ending in exactly 7, 3 or 1 days produce
//! one reminder per line manager that still has open evaluations in the
//! cycle. The notification row itself is the only record of a sent
//! reminder — a second run on the same day notifies again.

use crate::notifications::{reminder_priority, NotificationTemplate};
use crate::shared::error::ServiceError;
use crate::shared::schema::{cycle_team_assignments, evaluation_cycles, evaluations};
use crate::shared::state::AppState;
use crate::shared::utils::blocking;
use chrono::{DateTime, NaiveDate, Utc};
use cron::Schedule;
use diesel::prelude::*;
use log::{error, info};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

pub struct ReminderScheduler {
    state: Arc<AppState>,
    schedule: Schedule,
}

struct DueCycle {
    id: Uuid,
    organization_id: Uuid,
    name: String,
    days_left: i64,
    urgency: &'static str,
}

impl ReminderScheduler {
    pub fn new(state: Arc<AppState>) -> Result<Self, cron::error::Error> {
        let schedule = Schedule::from_str(&state.config.reminder_schedule)?;
        Ok(Self { state, schedule })
    }

    /// Tick loop; checks every 60 s whether the next scheduled run is due.
    pub fn spawn(self) {
        tokio::spawn(async move {
            info!(
                "Starting deadline reminder scheduler ({})",
                self.state.config.reminder_schedule
            );
            let mut next_run = self.upcoming();
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                interval.tick().await;
                let Some(due) = next_run else {
                    error!("Reminder schedule yields no upcoming runs; scheduler stopped");
                    return;
                };
                if Utc::now() >= due {
                    match self.run_once(Utc::now().date_naive()).await {
                        Ok(sent) => info!("Deadline reminder run complete, {} reminder(s) sent", sent),
                        Err(e) => error!("Deadline reminder run failed: {}", e),
                    }
                    next_run = self.upcoming();
                }
            }
        });
    }

    fn upcoming(&self) -> Option<DateTime<Utc>> {
        self.schedule.upcoming(Utc).next()
    }

    /// One reminder sweep for the given day. Returns reminders sent.
    pub async fn run_once(&self, today: NaiveDate) -> Result<usize, ServiceError> {
        let due_cycles = blocking(&self.state.conn, move |conn| {
            let active: Vec<(Uuid, Uuid, String, NaiveDate)> = evaluation_cycles::table
                .filter(evaluation_cycles::status.eq("active"))
                .select((
                    evaluation_cycles::id,
                    evaluation_cycles::organization_id,
                    evaluation_cycles::name,
                    evaluation_cycles::end_date,
                ))
                .load(conn)?;

            Ok(active
                .into_iter()
                .filter_map(|(id, organization_id, name, end_date)| {
                    let days_left = (end_date - today).num_days();
                    reminder_priority(days_left).map(|urgency| DueCycle {
                        id,
                        organization_id,
                        name,
                        days_left,
                        urgency,
                    })
                })
                .collect::<Vec<_>>())
        })
        .await?;

        let mut sent = 0;
        for cycle in due_cycles {
            let cycle_id = cycle.id;
            let outstanding: Vec<(Uuid, i64)> = blocking(&self.state.conn, move |conn| {
                Ok(evaluations::table
                    .inner_join(cycle_team_assignments::table)
                    .filter(cycle_team_assignments::cycle_id.eq(cycle_id))
                    .filter(evaluations::status.ne("completed"))
                    .group_by(evaluations::manager_id)
                    .select((evaluations::manager_id, diesel::dsl::count_star()))
                    .load(conn)?)
            })
            .await?;

            for (manager_id, pending_count) in outstanding {
                let template = NotificationTemplate::deadline_reminder(
                    &cycle.name,
                    cycle.id,
                    cycle.days_left,
                    pending_count,
                    cycle.urgency,
                );
                self.state
                    .notifier
                    .send(cycle.organization_id, manager_id, template)
                    .await;
                sent += 1;
            }
        }
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule_parses() {
        // Same format as the config default: sec min hour day month weekday
        let schedule = Schedule::from_str("0 0 8 * * *").unwrap();
        assert!(schedule.upcoming(Utc).next().is_some());
    }

    #[test]
    fn test_days_left_arithmetic() {
        let end = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
        assert_eq!((end - today).num_days(), 7);
        assert!(reminder_priority((end - today).num_days()).is_some());

        let today = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        assert_eq!((end - today).num_days(), 5);
        assert!(reminder_priority((end - today).num_days()).is_none());
    }
}
