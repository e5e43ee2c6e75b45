use async_trait::async_trait;
use chrono::{DateTime, Utc};
use localbid_core::notifications::Notification;
use localbid_core::repository::{AcceptedBid, OrderRepository, OrderTransition};
use localbid_core::{CoreError, CoreResult};
use localbid_order::{FulfillmentStatus, Order};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::database::db_err;
use crate::rows::{
    bid_request_id, collect, compute_bid_stats, insert_notification, lock_bid, lock_request,
    save_bid_status, save_request_state, BidRow, OrderRow, BID_COLUMNS, ORDER_COLUMNS,
};

pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn list_orders_by(&self, column: &str, user_id: Uuid) -> CoreResult<Vec<Order>> {
        let sql = format!(
            "SELECT {} FROM orders WHERE {} = $1 ORDER BY created_at DESC",
            ORDER_COLUMNS, column
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        collect(rows, OrderRow::into_order)
    }

    /// Locks the order, applies `change` and persists the result along with
    /// the customer counter and notification it implies.
    async fn transition<F>(&self, shop_id: Uuid, order_id: Uuid, change: F) -> CoreResult<OrderTransition>
    where
        F: FnOnce(&mut Order, DateTime<Utc>) -> CoreResult<FulfillmentStatus> + Send,
    {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let mut order = lock_order(&mut tx, order_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("order {}", order_id)))?;
        order.ensure_shop(shop_id)?;
        let previous = change(&mut order, now)?;

        sqlx::query(
            "UPDATE orders SET fulfillment_status = $2, pickup_code_verified_at = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(order.id)
        .bind(order.fulfillment_status.as_str())
        .bind(order.pickup_code_verified_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if previous != order.fulfillment_status {
            if order.fulfillment_status == FulfillmentStatus::Completed {
                sqlx::query(
                    r#"
                    INSERT INTO customer_profiles (user_id, orders_completed) VALUES ($1, 1)
                    ON CONFLICT (user_id) DO UPDATE
                    SET orders_completed = customer_profiles.orders_completed + 1, updated_at = NOW()
                    "#,
                )
                .bind(order.customer_id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            }
            if let Some(note) = Notification::order_progress(&order, now) {
                insert_notification(&mut tx, &note).await?;
            }
        }

        tx.commit().await.map_err(db_err)?;
        info!(
            order_id = %order.id,
            from = %previous,
            to = %order.fulfillment_status,
            "Order status updated"
        );
        Ok(OrderTransition { order, previous })
    }
}

async fn lock_order(conn: &mut PgConnection, id: Uuid) -> CoreResult<Option<Order>> {
    let sql = format!("SELECT {} FROM orders WHERE id = $1 FOR UPDATE", ORDER_COLUMNS);
    sqlx::query_as::<_, OrderRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?
        .map(OrderRow::into_order)
        .transpose()
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn accept_bid(
        &self,
        customer_id: Uuid,
        bid_id: Uuid,
        fee_rate: Decimal,
    ) -> CoreResult<AcceptedBid> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let not_found = || CoreError::NotFound(format!("bid {}", bid_id));

        // Lock order: request row, then bid rows
        let request_id = bid_request_id(&mut tx, bid_id).await?.ok_or_else(not_found)?;
        let mut request = lock_request(&mut tx, request_id)
            .await?
            .ok_or_else(|| CoreError::Forbidden("Request not found or not owned by you".to_string()))?;
        let mut bid = lock_bid(&mut tx, bid_id).await?.ok_or_else(not_found)?;

        request.ensure_acceptable_by(customer_id, now)?;
        bid.ensure_acceptable()?;

        bid.accept(now);
        save_bid_status(&mut tx, &bid).await?;

        let sql = format!(
            r#"
            UPDATE bids SET status = 'rejected', updated_at = $3
            WHERE request_id = $1 AND id <> $2 AND status = 'active'
            RETURNING {}
            "#,
            BID_COLUMNS
        );
        let rows = sqlx::query_as::<_, BidRow>(&sql)
            .bind(request.id)
            .bind(bid.id)
            .bind(now)
            .fetch_all(&mut *tx)
            .await
            .map_err(db_err)?;
        let rejected_bids = collect(rows, BidRow::into_bid)?;

        request.close_with(bid.id, now);
        let stats = compute_bid_stats(&mut tx, request.id).await?;
        request.apply_stats(&stats);
        save_request_state(&mut tx, &request).await?;

        let order = Order::from_accepted_bid(&request, &bid, fee_rate, now);
        sqlx::query(
            r#"
            INSERT INTO orders (id, order_number, request_id, bid_id, customer_id, shop_id, total_amount,
                platform_fee, shop_amount, payment_status, fulfillment_status, pickup_code, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.request_id)
        .bind(order.bid_id)
        .bind(order.customer_id)
        .bind(order.shop_id)
        .bind(order.total_amount)
        .bind(order.platform_fee)
        .bind(order.shop_amount)
        .bind(order.payment_status.as_str())
        .bind(order.fulfillment_status.as_str())
        .bind(&order.pickup_code)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query(
            r#"
            UPDATE shop_profiles
            SET bids_won = bids_won + 1, total_revenue = total_revenue + $2, updated_at = $3
            WHERE user_id = $1
            "#,
        )
        .bind(order.shop_id)
        .bind(order.shop_amount)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        insert_notification(&mut tx, &Notification::bid_accepted(&request, &order, now)).await?;
        for rejected in &rejected_bids {
            insert_notification(&mut tx, &Notification::bid_rejected(&request, rejected, now)).await?;
        }

        tx.commit().await.map_err(db_err)?;
        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            bid_id = %bid.id,
            rejected = rejected_bids.len(),
            "Bid accepted"
        );

        Ok(AcceptedBid {
            order,
            bid,
            request,
            rejected_bids,
        })
    }

    async fn list_customer_orders(&self, customer_id: Uuid) -> CoreResult<Vec<Order>> {
        self.list_orders_by("customer_id", customer_id).await
    }

    async fn list_shop_orders(&self, shop_id: Uuid) -> CoreResult<Vec<Order>> {
        self.list_orders_by("shop_id", shop_id).await
    }

    async fn update_fulfillment_status(
        &self,
        shop_id: Uuid,
        order_id: Uuid,
        status: FulfillmentStatus,
    ) -> CoreResult<OrderTransition> {
        self.transition(shop_id, order_id, move |order, now| {
            Ok(order.transition_to(status, now)?)
        })
        .await
    }

    async fn verify_pickup(&self, shop_id: Uuid, order_id: Uuid, code: &str) -> CoreResult<OrderTransition> {
        let code = code.to_string();
        self.transition(shop_id, order_id, move |order, now| {
            Ok(order.verify_pickup_code(&code, now)?)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use localbid_core::accounts::{AccountType, NewUser};
    use localbid_core::repository::{BidRepository, RequestRepository, UserRepository};
    use localbid_market::{Availability, BidStatus, NewBid, NewRequest, RequestStatus};

    use crate::bid_repo::PgBidRepository;
    use crate::request_repo::PgRequestRepository;
    use crate::user_repo::PgUserRepository;

    async fn user(pool: &PgPool, email: &str, account_type: AccountType) -> Uuid {
        PgUserRepository::new(pool.clone())
            .create_user(NewUser {
                email: email.to_string(),
                name: email.to_string(),
                password_hash: "$2b$12$hash".to_string(),
                account_type,
                business_name: Some(format!("{} shop", email)),
            })
            .await
            .unwrap()
            .id
    }

    fn bid_on(request_id: Uuid, cents: i64) -> NewBid {
        NewBid {
            request_id,
            price: Decimal::new(cents, 2),
            availability: Availability::InStock,
            delivery_available: false,
            delivery_price: Decimal::ZERO,
            notes: None,
            photos: vec![],
        }
    }

    #[sqlx::test(migrations = "../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_accept_bid_is_all_or_nothing(pool: PgPool) {
        let customer = user(&pool, "buyer@example.com", AccountType::Customer).await;
        let shop_a = user(&pool, "a@example.com", AccountType::Shop).await;
        let shop_b = user(&pool, "b@example.com", AccountType::Shop).await;

        let requests = PgRequestRepository::new(pool.clone());
        let bids = PgBidRepository::new(pool.clone());
        let orders = PgOrderRepository::new(pool.clone());

        let request = requests
            .create_request(
                customer,
                NewRequest {
                    title: "Ceiling fan".to_string(),
                    description: None,
                    category: "Home".to_string(),
                    quantity: 1,
                    search_radius_miles: 10,
                    budget_min: None,
                    budget_max: None,
                    bid_duration_hours: 24,
                    photos: vec![],
                    latitude: None,
                    longitude: None,
                },
            )
            .await
            .unwrap();

        let winner = bids.submit_bid(shop_a, bid_on(request.id, 12000)).await.unwrap();
        let loser = bids.submit_bid(shop_b, bid_on(request.id, 9950)).await.unwrap();
        assert_eq!(loser.request.bids_count, 2);
        assert_eq!(loser.request.lowest_bid_price, Some(Decimal::new(9950, 2)));

        let accepted = orders
            .accept_bid(customer, winner.bid.id, Decimal::new(5, 2))
            .await
            .unwrap();
        assert_eq!(accepted.order.total_amount, Decimal::new(12000, 2));
        assert_eq!(accepted.order.platform_fee, Decimal::new(600, 2));
        assert_eq!(accepted.rejected_bids.len(), 1);
        assert_eq!(accepted.request.status, RequestStatus::Closed);

        let loser_bid = bids.get_bid(loser.bid.id).await.unwrap().unwrap();
        assert_eq!(loser_bid.status, BidStatus::Rejected);

        let again = orders.accept_bid(customer, winner.bid.id, Decimal::new(5, 2)).await;
        assert!(matches!(again, Err(CoreError::Conflict(_))));
        assert_eq!(orders.list_customer_orders(customer).await.unwrap().len(), 1);
    }
}
