use async_trait::async_trait;
use localbid_core::notifications::Notification;
use localbid_core::repository::NotificationRepository;
use localbid_core::{CoreError, CoreResult};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::db_err;
use crate::rows::{collect, NotificationRow, NOTIFICATION_COLUMNS};

pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn list_notifications(&self, user_id: Uuid) -> CoreResult<Vec<Notification>> {
        let sql = format!(
            "SELECT {} FROM notifications WHERE user_id = $1 ORDER BY created_at DESC LIMIT 100",
            NOTIFICATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        collect(rows, NotificationRow::into_notification)
    }

    async fn mark_notification_read(&self, user_id: Uuid, id: Uuid) -> CoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = TRUE, read_at = COALESCE(read_at, NOW())
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("notification {}", id)));
        }
        Ok(())
    }
}
