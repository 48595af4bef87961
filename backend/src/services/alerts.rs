//! Alert generation and the per-user alert inbox

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Alert, AlertDraft, AlertRule, AlertType, ProductActivity};
use crate::services::sales_stats::product_activity;

const ALERT_COLUMNS: &str = "id, user_id, product_id, alert_type, severity, title, message, data, \
     is_read, is_archived, created_at, read_at";

/// Alert service
#[derive(Clone)]
pub struct AlertService {
    db: PgPool,
}

#[derive(Debug, Default, Deserialize)]
pub struct AlertFilter {
    #[serde(default)]
    pub unread_only: bool,
    #[serde(default)]
    pub include_archived: bool,
    pub alert_type: Option<AlertType>,
    pub limit: Option<i64>,
}

/// Number of alerts created per rule in one generation run
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationReport {
    pub created: BTreeMap<&'static str, usize>,
    pub skipped_duplicates: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnreadCount {
    pub unread: i64,
}

/// Evaluate `rules` against every product, leaving out drafts that would
/// duplicate an unread alert of the same type for the same product.
pub fn plan_alerts(
    rules: &[AlertRule],
    activities: &[ProductActivity],
    unread: &HashSet<(AlertType, Option<Uuid>)>,
) -> (Vec<(AlertRule, AlertDraft)>, usize) {
    let mut planned = Vec::new();
    let mut seen = unread.clone();
    let mut skipped = 0;

    for rule in rules {
        for activity in activities {
            let Some(draft) = rule.evaluate(activity) else {
                continue;
            };
            if seen.insert((draft.alert_type, draft.product_id)) {
                planned.push((*rule, draft));
            } else {
                skipped += 1;
            }
        }
    }
    (planned, skipped)
}

/// Type and product of every unread alert. Archiving does not clear an
/// alert for deduplication; only reading it does.
pub fn unread_keys(alerts: &[Alert]) -> HashSet<(AlertType, Option<Uuid>)> {
    alerts
        .iter()
        .filter(|alert| !alert.is_read)
        .map(|alert| (alert.alert_type, alert.product_id))
        .collect()
}

impl AlertService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Run the given rules for a user and store the new alerts
    pub async fn generate(
        &self,
        user_id: Uuid,
        rules: &[AlertRule],
        today: NaiveDate,
    ) -> AppResult<GenerationReport> {
        let activities = product_activity(&self.db, today).await?;

        let existing = sqlx::query_as::<_, Alert>(&format!(
            "SELECT {} FROM alerts WHERE user_id = $1 AND NOT is_read",
            ALERT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        let unread = unread_keys(&existing);

        let (planned, skipped) = plan_alerts(rules, &activities, &unread);

        let mut report = GenerationReport {
            skipped_duplicates: skipped,
            ..Default::default()
        };
        for rule in rules {
            report.created.insert(rule.as_str(), 0);
        }

        let mut tx = self.db.begin().await?;
        for (rule, draft) in &planned {
            sqlx::query(
                r#"
                INSERT INTO alerts (user_id, product_id, alert_type, severity, title, message, data)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(user_id)
            .bind(draft.product_id)
            .bind(draft.alert_type)
            .bind(draft.severity)
            .bind(&draft.title)
            .bind(&draft.message)
            .bind(&draft.data)
            .execute(&mut *tx)
            .await?;

            *report.created.entry(rule.as_str()).or_insert(0) += 1;
        }
        tx.commit().await?;

        report.total = planned.len();

        tracing::info!(
            user_id = %user_id,
            products = activities.len(),
            created = report.total,
            skipped = report.skipped_duplicates,
            "Alerts generated"
        );
        for (rule, count) in &report.created {
            tracing::debug!(rule = %rule, count, "Alert rule result");
        }

        Ok(report)
    }

    pub async fn list(&self, user_id: Uuid, filter: &AlertFilter) -> AppResult<Vec<Alert>> {
        let limit = filter.limit.unwrap_or(100).clamp(1, 500);
        let alerts = sqlx::query_as::<_, Alert>(&format!(
            r#"
            SELECT {}
            FROM alerts
            WHERE user_id = $1
              AND (NOT is_read OR NOT $2)
              AND (NOT is_archived OR $3)
              AND ($4::alert_type IS NULL OR alert_type = $4)
            ORDER BY created_at DESC
            LIMIT $5
            "#,
            ALERT_COLUMNS
        ))
        .bind(user_id)
        .bind(filter.unread_only)
        .bind(filter.include_archived)
        .bind(filter.alert_type)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        Ok(alerts)
    }

    pub async fn unread_count(&self, user_id: Uuid) -> AppResult<UnreadCount> {
        let unread: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM alerts WHERE user_id = $1 AND NOT is_read AND NOT is_archived",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;
        Ok(UnreadCount { unread })
    }

    pub async fn mark_read(&self, user_id: Uuid, alert_id: Uuid) -> AppResult<Alert> {
        sqlx::query_as::<_, Alert>(&format!(
            r#"
            UPDATE alerts
            SET is_read = TRUE, read_at = COALESCE(read_at, NOW())
            WHERE id = $1 AND user_id = $2
            RETURNING {}
            "#,
            ALERT_COLUMNS
        ))
        .bind(alert_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Alert {}", alert_id)))
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE alerts
            SET is_read = TRUE, read_at = NOW()
            WHERE user_id = $1 AND NOT is_read
            "#,
        )
        .bind(user_id)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn archive(&self, user_id: Uuid, alert_id: Uuid) -> AppResult<Alert> {
        sqlx::query_as::<_, Alert>(&format!(
            r#"
            UPDATE alerts
            SET is_archived = TRUE
            WHERE id = $1 AND user_id = $2
            RETURNING {}
            "#,
            ALERT_COLUMNS
        ))
        .bind(alert_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Alert {}", alert_id)))
    }

    /// Archive read alerts older than `days` days, for every user
    pub async fn archive_old(&self, days: i64) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE alerts
            SET is_archived = TRUE
            WHERE is_read AND NOT is_archived
              AND created_at < NOW() - make_interval(days => $1::int)
            "#,
        )
        .bind(days.max(0) as i32)
        .execute(&self.db)
        .await?;

        tracing::info!(days, archived = result.rows_affected(), "Old alerts archived");
        Ok(result.rows_affected())
    }
}
