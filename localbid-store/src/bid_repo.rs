use async_trait::async_trait;
use chrono::Utc;
use localbid_core::notifications::Notification;
use localbid_core::repository::{BidRepository, SubmittedBid};
use localbid_core::{CoreError, CoreResult};
use localbid_market::{Bid, MarketError, NewBid};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::database::db_err;
use crate::rows::{
    bid_request_id, collect, compute_bid_stats, insert_notification, lock_bid, lock_request,
    save_bid_status, save_request_state, BidRow, BID_COLUMNS,
};

pub struct PgBidRepository {
    pool: PgPool,
}

impl PgBidRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BidRepository for PgBidRepository {
    async fn submit_bid(&self, shop_id: Uuid, input: NewBid) -> CoreResult<SubmittedBid> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let mut request = lock_request(&mut tx, input.request_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("request {}", input.request_id)))?;
        request.ensure_biddable_by(shop_id, now)?;

        let already_bid: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM bids WHERE request_id = $1 AND shop_id = $2)")
                .bind(request.id)
                .bind(shop_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(db_err)?;
        if already_bid {
            return Err(MarketError::DuplicateBid.into());
        }

        let bid = Bid::new(shop_id, input, now);
        sqlx::query(
            r#"
            INSERT INTO bids (id, request_id, shop_id, price, availability, delivery_available, delivery_price,
                notes, photos, status, submitted_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(bid.id)
        .bind(bid.request_id)
        .bind(bid.shop_id)
        .bind(bid.price)
        .bind(bid.availability.as_str())
        .bind(bid.delivery_available)
        .bind(bid.delivery_price)
        .bind(&bid.notes)
        .bind(&bid.photos)
        .bind(bid.status.as_str())
        .bind(bid.submitted_at)
        .bind(bid.created_at)
        .bind(bid.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        let stats = compute_bid_stats(&mut tx, request.id).await?;
        request.apply_stats(&stats);
        request.updated_at = now;
        save_request_state(&mut tx, &request).await?;

        sqlx::query("UPDATE shop_profiles SET bids_submitted = bids_submitted + 1, updated_at = $2 WHERE user_id = $1")
            .bind(shop_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        insert_notification(&mut tx, &Notification::bid_received(&request, &bid, now)).await?;

        tx.commit().await.map_err(db_err)?;
        info!(bid_id = %bid.id, request_id = %request.id, bids_count = request.bids_count, "Bid submitted");
        Ok(SubmittedBid { bid, request })
    }

    async fn withdraw_bid(&self, shop_id: Uuid, bid_id: Uuid) -> CoreResult<SubmittedBid> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let not_found = || CoreError::NotFound(format!("bid {}", bid_id));

        // Request row first, same lock order as acceptance
        let request_id = bid_request_id(&mut tx, bid_id).await?.ok_or_else(not_found)?;
        let mut request = lock_request(&mut tx, request_id).await?.ok_or_else(not_found)?;
        let mut bid = lock_bid(&mut tx, bid_id).await?.ok_or_else(not_found)?;

        bid.ensure_withdrawable_by(shop_id)?;
        bid.withdraw(now);
        save_bid_status(&mut tx, &bid).await?;

        let stats = compute_bid_stats(&mut tx, request.id).await?;
        request.apply_stats(&stats);
        request.updated_at = now;
        save_request_state(&mut tx, &request).await?;

        tx.commit().await.map_err(db_err)?;
        info!(bid_id = %bid.id, request_id = %request.id, "Bid withdrawn");
        Ok(SubmittedBid { bid, request })
    }

    async fn get_bid(&self, id: Uuid) -> CoreResult<Option<Bid>> {
        let sql = format!("SELECT {} FROM bids WHERE id = $1", BID_COLUMNS);
        sqlx::query_as::<_, BidRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(BidRow::into_bid)
            .transpose()
    }

    async fn list_request_bids(&self, request_id: Uuid) -> CoreResult<Vec<Bid>> {
        let sql = format!(
            "SELECT {} FROM bids WHERE request_id = $1 ORDER BY price ASC, submitted_at ASC",
            BID_COLUMNS
        );
        let rows = sqlx::query_as::<_, BidRow>(&sql)
            .bind(request_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        collect(rows, BidRow::into_bid)
    }

    async fn list_shop_bids(&self, shop_id: Uuid) -> CoreResult<Vec<Bid>> {
        let sql = format!(
            "SELECT {} FROM bids WHERE shop_id = $1 ORDER BY submitted_at DESC",
            BID_COLUMNS
        );
        let rows = sqlx::query_as::<_, BidRow>(&sql)
            .bind(shop_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        collect(rows, BidRow::into_bid)
    }
}
