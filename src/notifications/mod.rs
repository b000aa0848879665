//! Notification fan-out.
//!
//! Workflow events map to templates and land as rows in the
//! `notifications` table — the only delivery channel. Sends are
//! best-effort: failures are logged and never surface into the business
//! transaction that triggered them.

pub mod reminders;

use crate::security::AuthenticatedEmployee;
use crate::shared::error::ServiceError;
use crate::shared::models::{Notification, SuccessResponse};
use crate::shared::schema::notifications;
use crate::shared::state::AppState;
use crate::shared::utils::{blocking, DbPool};
use axum::extract::{Path, Query, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::Utc;
use diesel::prelude::*;
use log::error;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub mod types {
    pub const TEAM_ASSIGNMENT: &str = "team_assignment";
    pub const CYCLE_ACTIVATED: &str = "cycle_activated";
    pub const EVALUATION_COMPLETED: &str = "evaluation_completed";
    pub const MANAGER_COMPLETED: &str = "manager_completed";
    pub const DEADLINE_REMINDER: &str = "deadline_reminder";
}

pub mod priority {
    pub const LOW: &str = "low";
    pub const NORMAL: &str = "normal";
    pub const HIGH: &str = "high";
    pub const URGENT: &str = "urgent";
}

/// One workflow event rendered for delivery.
#[derive(Debug, Clone)]
pub struct NotificationTemplate {
    pub notification_type: &'static str,
    pub title: String,
    pub message: String,
    pub metadata: serde_json::Value,
    pub action_url: Option<String>,
    pub priority: &'static str,
}

impl NotificationTemplate {
    pub fn team_assignment(team_name: &str, cycle_name: &str, cycle_id: Uuid) -> Self {
        Self {
            notification_type: types::TEAM_ASSIGNMENT,
            title: "New team assignment".to_string(),
            message: format!(
                "You have been assigned to evaluate team '{}' in cycle '{}'",
                team_name, cycle_name
            ),
            metadata: serde_json::json!({ "cycle_id": cycle_id, "team": team_name }),
            action_url: Some(format!("/cycles/{}", cycle_id)),
            priority: priority::NORMAL,
        }
    }

    pub fn cycle_activated(cycle_name: &str, cycle_id: Uuid, end_date: chrono::NaiveDate) -> Self {
        Self {
            notification_type: types::CYCLE_ACTIVATED,
            title: "Evaluation cycle started".to_string(),
            message: format!(
                "Evaluation cycle '{}' is now active and runs until {}",
                cycle_name, end_date
            ),
            metadata: serde_json::json!({ "cycle_id": cycle_id, "end_date": end_date }),
            action_url: Some(format!("/cycles/{}", cycle_id)),
            priority: priority::HIGH,
        }
    }

    pub fn evaluation_completed(cycle_name: &str, evaluation_id: Uuid) -> Self {
        Self {
            notification_type: types::EVALUATION_COMPLETED,
            title: "Your evaluation is complete".to_string(),
            message: format!(
                "Your performance evaluation for cycle '{}' has been submitted",
                cycle_name
            ),
            metadata: serde_json::json!({ "evaluation_id": evaluation_id }),
            action_url: Some("/my-evaluations".to_string()),
            priority: priority::NORMAL,
        }
    }

    pub fn manager_completed(manager_name: &str, team_name: &str, cycle_name: &str) -> Self {
        Self {
            notification_type: types::MANAGER_COMPLETED,
            title: "Manager finished evaluations".to_string(),
            message: format!(
                "{} completed all evaluations for team '{}' in cycle '{}'",
                manager_name, team_name, cycle_name
            ),
            metadata: serde_json::json!({ "team": team_name, "cycle": cycle_name }),
            action_url: None,
            priority: priority::NORMAL,
        }
    }

    pub fn deadline_reminder(
        cycle_name: &str,
        cycle_id: Uuid,
        days_left: i64,
        pending_count: i64,
        urgency: &'static str,
    ) -> Self {
        Self {
            notification_type: types::DEADLINE_REMINDER,
            title: format!("Evaluations due in {} day(s)", days_left),
            message: format!(
                "Cycle '{}' ends in {} day(s); {} evaluation(s) still open",
                cycle_name, days_left, pending_count
            ),
            metadata: serde_json::json!({
                "cycle_id": cycle_id,
                "days_left": days_left,
                "pending_count": pending_count,
            }),
            action_url: Some(format!("/cycles/{}", cycle_id)),
            priority: urgency,
        }
    }
}

/// Reminder urgency tier by days remaining. Only the 7/3/1 marks notify.
pub fn reminder_priority(days_left: i64) -> Option<&'static str> {
    match days_left {
        7 => Some(priority::NORMAL),
        3 => Some(priority::HIGH),
        1 => Some(priority::URGENT),
        _ => None,
    }
}

/// Writes notification rows. Clone-cheap; lives in `AppState`.
#[derive(Clone)]
pub struct Notifier {
    pool: DbPool,
}

impl Notifier {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Single-recipient send. Errors are logged and swallowed.
    pub async fn send(&self, organization_id: Uuid, recipient_id: Uuid, template: NotificationTemplate) {
        self.send_bulk(organization_id, vec![recipient_id], template)
            .await;
    }

    /// Bulk fan-out of one template to many recipients in a single insert.
    pub async fn send_bulk(
        &self,
        organization_id: Uuid,
        recipients: Vec<Uuid>,
        template: NotificationTemplate,
    ) {
        if recipients.is_empty() {
            return;
        }
        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let rows: Vec<Notification> = recipients
                .into_iter()
                .map(|recipient_id| Notification {
                    id: Uuid::new_v4(),
                    organization_id,
                    recipient_id,
                    notification_type: template.notification_type.to_string(),
                    title: template.title.clone(),
                    message: template.message.clone(),
                    metadata: template.metadata.clone(),
                    action_url: template.action_url.clone(),
                    priority: template.priority.to_string(),
                    is_read: false,
                    created_at: Utc::now(),
                })
                .collect();
            diesel::insert_into(notifications::table)
                .values(&rows)
                .execute(&mut conn)?;
            Ok::<usize, ServiceError>(rows.len())
        })
        .await;

        match result {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!("Failed to write notifications: {}", e),
            Err(e) => error!("Notification task failed: {}", e),
        }
    }
}

// ---------------------------------------------------------------------------
// REST surface
// ---------------------------------------------------------------------------

pub fn configure_notification_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/unread-count", get(unread_count))
        .route("/api/notifications/:id/read", put(mark_read))
        .route("/api/notifications/read-all", put(mark_all_read))
}

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    pub unread_only: Option<bool>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub count: i64,
}

pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Vec<Notification>>, ServiceError> {
    let recipient = auth.id;
    let rows = blocking(&state.conn, move |conn| {
        let mut q = notifications::table
            .filter(notifications::recipient_id.eq(recipient))
            .into_boxed();
        if query.unread_only.unwrap_or(false) {
            q = q.filter(notifications::is_read.eq(false));
        }
        Ok(q.order(notifications::created_at.desc())
            .limit(query.limit.unwrap_or(50).clamp(1, 200))
            .load::<Notification>(conn)?)
    })
    .await?;
    Ok(Json(rows))
}

pub async fn unread_count(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
) -> Result<Json<UnreadCountResponse>, ServiceError> {
    let recipient = auth.id;
    let count = blocking(&state.conn, move |conn| {
        Ok(notifications::table
            .filter(notifications::recipient_id.eq(recipient))
            .filter(notifications::is_read.eq(false))
            .count()
            .get_result::<i64>(conn)?)
    })
    .await?;
    Ok(Json(UnreadCountResponse { count }))
}

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, ServiceError> {
    let recipient = auth.id;
    blocking(&state.conn, move |conn| {
        let updated = diesel::update(
            notifications::table
                .filter(notifications::id.eq(id))
                .filter(notifications::recipient_id.eq(recipient)),
        )
        .set(notifications::is_read.eq(true))
        .execute(conn)?;
        if updated == 0 {
            return Err(ServiceError::NotFound("Notification not found".into()));
        }
        Ok(())
    })
    .await?;
    Ok(Json(SuccessResponse::new("Notification marked as read")))
}

pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
) -> Result<Json<SuccessResponse>, ServiceError> {
    let recipient = auth.id;
    blocking(&state.conn, move |conn| {
        diesel::update(
            notifications::table
                .filter(notifications::recipient_id.eq(recipient))
                .filter(notifications::is_read.eq(false)),
        )
        .set(notifications::is_read.eq(true))
        .execute(conn)?;
        Ok(())
    })
    .await?;
    Ok(Json(SuccessResponse::new("All notifications marked as read")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reminder_priority_tiers() {
        assert_eq!(reminder_priority(7), Some(priority::NORMAL));
        assert_eq!(reminder_priority(3), Some(priority::HIGH));
        assert_eq!(reminder_priority(1), Some(priority::URGENT));
        assert_eq!(reminder_priority(2), None);
        assert_eq!(reminder_priority(0), None);
        assert_eq!(reminder_priority(14), None);
    }

    #[test]
    fn test_team_assignment_template() {
        let cycle_id = Uuid::new_v4();
        let tpl = NotificationTemplate::team_assignment("Platform", "Q3 Review", cycle_id);
        assert_eq!(tpl.notification_type, types::TEAM_ASSIGNMENT);
        assert!(tpl.message.contains("Platform"));
        assert!(tpl.message.contains("Q3 Review"));
        assert_eq!(tpl.metadata["cycle_id"], serde_json::json!(cycle_id));
        assert_eq!(tpl.priority, priority::NORMAL);
    }

    #[test]
    fn test_deadline_reminder_template_carries_counts() {
        let cycle_id = Uuid::new_v4();
        let tpl =
            NotificationTemplate::deadline_reminder("Q3 Review", cycle_id, 3, 5, priority::HIGH);
        assert_eq!(tpl.notification_type, types::DEADLINE_REMINDER);
        assert_eq!(tpl.metadata["days_left"], serde_json::json!(3));
        assert_eq!(tpl.metadata["pending_count"], serde_json::json!(5));
        assert_eq!(tpl.priority, priority::HIGH);
    }
}
