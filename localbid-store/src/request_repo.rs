use async_trait::async_trait;
use chrono::{DateTime, Utc};
use localbid_core::repository::RequestRepository;
use localbid_core::{CoreError, CoreResult};
use localbid_market::{NewRequest, ProductRequest};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::database::db_err;
use crate::rows::{collect, lock_request, RequestRow, REQUEST_COLUMNS};

pub struct PgRequestRepository {
    pool: PgPool,
}

impl PgRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RequestRepository for PgRequestRepository {
    async fn create_request(&self, customer_id: Uuid, input: NewRequest) -> CoreResult<ProductRequest> {
        let request = ProductRequest::new(customer_id, input, Utc::now());
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            r#"
            INSERT INTO requests (id, customer_id, title, description, category, quantity, search_radius_miles,
                budget_min, budget_max, bid_duration_hours, photos, status, expires_at, latitude, longitude,
                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(request.id)
        .bind(request.customer_id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(&request.category)
        .bind(request.quantity)
        .bind(request.search_radius_miles)
        .bind(request.budget_min)
        .bind(request.budget_max)
        .bind(request.bid_duration_hours)
        .bind(&request.photos)
        .bind(request.status.as_str())
        .bind(request.expires_at)
        .bind(request.latitude)
        .bind(request.longitude)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query(
            r#"
            INSERT INTO customer_profiles (user_id, requests_created) VALUES ($1, 1)
            ON CONFLICT (user_id) DO UPDATE
            SET requests_created = customer_profiles.requests_created + 1, updated_at = NOW()
            "#,
        )
        .bind(customer_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(request)
    }

    async fn get_request(&self, id: Uuid) -> CoreResult<Option<ProductRequest>> {
        let sql = format!("SELECT {} FROM requests WHERE id = $1", REQUEST_COLUMNS);
        sqlx::query_as::<_, RequestRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(RequestRow::into_request)
            .transpose()
    }

    async fn list_customer_requests(&self, customer_id: Uuid) -> CoreResult<Vec<ProductRequest>> {
        let sql = format!(
            "SELECT {} FROM requests WHERE customer_id = $1 ORDER BY created_at DESC",
            REQUEST_COLUMNS
        );
        let rows = sqlx::query_as::<_, RequestRow>(&sql)
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        collect(rows, RequestRow::into_request)
    }

    async fn list_open_requests(&self, now: DateTime<Utc>) -> CoreResult<Vec<ProductRequest>> {
        let sql = format!(
            "SELECT {} FROM requests WHERE status = 'active' AND expires_at > $1 ORDER BY created_at DESC",
            REQUEST_COLUMNS
        );
        let rows = sqlx::query_as::<_, RequestRow>(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        collect(rows, RequestRow::into_request)
    }

    async fn cancel_request(&self, customer_id: Uuid, id: Uuid) -> CoreResult<ProductRequest> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let mut request = lock_request(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("request {}", id)))?;
        request.ensure_cancellable_by(customer_id)?;
        request.cancel(now);

        sqlx::query("UPDATE requests SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(request.id)
            .bind(request.status.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        sqlx::query("UPDATE bids SET status = 'rejected', updated_at = $2 WHERE request_id = $1 AND status = 'active'")
            .bind(request.id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        info!(request_id = %request.id, "Request cancelled");
        Ok(request)
    }

    async fn expire_due_requests(&self, now: DateTime<Utc>) -> CoreResult<Vec<Uuid>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let expired: Vec<Uuid> = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE requests SET status = 'expired', updated_at = $1
            WHERE status = 'active' AND expires_at <= $1
            RETURNING id
            "#,
        )
        .bind(now)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err)?;

        if !expired.is_empty() {
            sqlx::query(
                "UPDATE bids SET status = 'rejected', updated_at = $2 WHERE request_id = ANY($1) AND status = 'active'",
            )
            .bind(&expired)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use localbid_core::accounts::{AccountType, NewUser};
    use localbid_core::repository::UserRepository;
    use localbid_market::RequestStatus;

    use crate::user_repo::PgUserRepository;

    fn drill(hours: i32) -> NewRequest {
        NewRequest {
            title: "Cordless drill".to_string(),
            description: Some("18V, with battery".to_string()),
            category: "Tools".to_string(),
            quantity: 1,
            search_radius_miles: 10,
            budget_min: None,
            budget_max: None,
            bid_duration_hours: hours,
            photos: vec![],
            latitude: None,
            longitude: None,
        }
    }

    #[sqlx::test(migrations = "../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_expiry_sweep_and_open_feed(pool: PgPool) {
        let customer = PgUserRepository::new(pool.clone())
            .create_user(NewUser {
                email: "buyer@example.com".to_string(),
                name: "Buyer".to_string(),
                password_hash: "$2b$12$hash".to_string(),
                account_type: AccountType::Customer,
                business_name: None,
            })
            .await
            .unwrap();
        let repo = PgRequestRepository::new(pool);

        let request = repo.create_request(customer.id, drill(2)).await.unwrap();
        assert_eq!(repo.list_open_requests(Utc::now()).await.unwrap().len(), 1);

        let later = Utc::now() + Duration::hours(3);
        assert!(repo.list_open_requests(later).await.unwrap().is_empty());
        assert_eq!(repo.expire_due_requests(later).await.unwrap(), vec![request.id]);

        let stored = repo.get_request(request.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Expired);
    }
}
