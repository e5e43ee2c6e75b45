use async_trait::async_trait;
use chrono::Utc;
use localbid_core::accounts::{
    AccountType, CustomerProfile, NewUser, ShopProfile, ShopProfileInput, User,
};
use localbid_core::repository::{ProfileRepository, UserRepository};
use localbid_core::{CoreError, CoreResult};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::database::db_err;
use crate::rows::{
    collect, CustomerProfileRow, ShopProfileRow, UserRow, CUSTOMER_PROFILE_COLUMNS,
    SHOP_PROFILE_COLUMNS, USER_COLUMNS,
};

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn ensure_customer_profile(conn: &mut PgConnection, user_id: Uuid) -> CoreResult<()> {
    sqlx::query("INSERT INTO customer_profiles (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    Ok(())
}

async fn ensure_shop_profile(conn: &mut PgConnection, profile: &ShopProfile) -> CoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO shop_profiles (user_id, business_name, categories, service_radius_miles, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $5)
        ON CONFLICT (user_id) DO NOTHING
        "#,
    )
    .bind(profile.user_id)
    .bind(&profile.business_name)
    .bind(&profile.categories)
    .bind(profile.service_radius_miles)
    .bind(profile.created_at)
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create_user(&self, input: NewUser) -> CoreResult<User> {
        let now = Utc::now();
        let user = User::new(&input, now);
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(&user.email)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;
        if taken {
            return Err(CoreError::Conflict("Email already registered".to_string()));
        }

        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, name, phone, account_type, role, is_verified, created_at, updated_at, last_signed_in)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(&user.phone)
        .bind(user.account_type.as_str())
        .bind(user.role.as_str())
        .bind(user.is_verified)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.last_signed_in)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        match user.account_type {
            AccountType::Customer => ensure_customer_profile(&mut tx, user.id).await?,
            AccountType::Shop => {
                let business_name = input
                    .business_name
                    .clone()
                    .unwrap_or_else(|| input.name.clone());
                ensure_shop_profile(&mut tx, &ShopProfile::placeholder(user.id, business_name, now)).await?
            }
            AccountType::Admin => {}
        }

        tx.commit().await.map_err(db_err)?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> CoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(UserRow::into_user)
            .transpose()
    }

    async fn get_user(&self, id: Uuid) -> CoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(UserRow::into_user)
            .transpose()
    }

    async fn record_sign_in(&self, id: Uuid) -> CoreResult<()> {
        sqlx::query("UPDATE users SET last_signed_in = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn set_account_type(&self, id: Uuid, account_type: AccountType) -> CoreResult<User> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let sql = format!(
            "UPDATE users SET account_type = $2, updated_at = $3 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(account_type.as_str())
            .bind(now)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?
            .ok_or_else(|| CoreError::NotFound(format!("user {}", id)))?
            .into_user()?;

        match account_type {
            AccountType::Customer => ensure_customer_profile(&mut tx, id).await?,
            AccountType::Shop => {
                let business_name = user.name.clone().unwrap_or_else(|| user.email.clone());
                ensure_shop_profile(&mut tx, &ShopProfile::placeholder(id, business_name, now)).await?
            }
            AccountType::Admin => {}
        }

        tx.commit().await.map_err(db_err)?;
        Ok(user)
    }
}

pub struct PgProfileRepository {
    pool: PgPool,
}

impl PgProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileRepository for PgProfileRepository {
    async fn get_or_create_customer_profile(&self, user_id: Uuid) -> CoreResult<CustomerProfile> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        ensure_customer_profile(&mut conn, user_id).await?;

        let sql = format!("SELECT {} FROM customer_profiles WHERE user_id = $1", CUSTOMER_PROFILE_COLUMNS);
        let row = sqlx::query_as::<_, CustomerProfileRow>(&sql)
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await
            .map_err(db_err)?;
        Ok(row.into())
    }

    async fn get_shop_profile(&self, user_id: Uuid) -> CoreResult<Option<ShopProfile>> {
        let sql = format!("SELECT {} FROM shop_profiles WHERE user_id = $1", SHOP_PROFILE_COLUMNS);
        sqlx::query_as::<_, ShopProfileRow>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(ShopProfileRow::into_profile)
            .transpose()
    }

    async fn upsert_shop_profile(
        &self,
        user_id: Uuid,
        input: ShopProfileInput,
    ) -> CoreResult<ShopProfile> {
        let sql = format!(
            r#"
            INSERT INTO shop_profiles (user_id, business_name, description, categories, service_radius_miles, business_license, tax_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id) DO UPDATE SET
                business_name = EXCLUDED.business_name,
                description = EXCLUDED.description,
                categories = EXCLUDED.categories,
                service_radius_miles = EXCLUDED.service_radius_miles,
                business_license = EXCLUDED.business_license,
                tax_id = EXCLUDED.tax_id,
                updated_at = NOW()
            RETURNING {}
            "#,
            SHOP_PROFILE_COLUMNS
        );
        sqlx::query_as::<_, ShopProfileRow>(&sql)
            .bind(user_id)
            .bind(&input.business_name)
            .bind(&input.description)
            .bind(&input.categories)
            .bind(input.service_radius_miles)
            .bind(&input.business_license)
            .bind(&input.tax_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?
            .into_profile()
    }

    async fn list_shops(&self) -> CoreResult<Vec<ShopProfile>> {
        let sql = format!(
            "SELECT {} FROM shop_profiles ORDER BY average_rating DESC, total_reviews DESC",
            SHOP_PROFILE_COLUMNS
        );
        let rows = sqlx::query_as::<_, ShopProfileRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        collect(rows, ShopProfileRow::into_profile)
    }

    async fn add_favorite_shop(&self, customer_id: Uuid, shop_id: Uuid) -> CoreResult<()> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM shop_profiles WHERE user_id = $1)")
            .bind(shop_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        if !exists {
            return Err(CoreError::NotFound(format!("shop {}", shop_id)));
        }

        sqlx::query(
            "INSERT INTO favorite_shops (customer_id, shop_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(customer_id)
        .bind(shop_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn remove_favorite_shop(&self, customer_id: Uuid, shop_id: Uuid) -> CoreResult<()> {
        sqlx::query("DELETE FROM favorite_shops WHERE customer_id = $1 AND shop_id = $2")
            .bind(customer_id)
            .bind(shop_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn list_favorite_shops(&self, customer_id: Uuid) -> CoreResult<Vec<ShopProfile>> {
        let columns = SHOP_PROFILE_COLUMNS
            .split(", ")
            .map(|c| format!("s.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            r#"
            SELECT {}
            FROM favorite_shops f
            JOIN shop_profiles s ON s.user_id = f.shop_id
            WHERE f.customer_id = $1
            ORDER BY f.created_at DESC
            "#,
            columns
        );
        let rows = sqlx::query_as::<_, ShopProfileRow>(&sql)
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        collect(rows, ShopProfileRow::into_profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str, account_type: AccountType) -> NewUser {
        NewUser {
            email: email.to_string(),
            name: "Dana".to_string(),
            password_hash: "$2b$12$hash".to_string(),
            account_type,
            business_name: Some("Dana's Hardware".to_string()),
        }
    }

    #[sqlx::test(migrations = "../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_shop_signup_creates_placeholder_profile(pool: PgPool) {
        let users = PgUserRepository::new(pool.clone());
        let profiles = PgProfileRepository::new(pool);

        let user = users.create_user(new_user("shop@example.com", AccountType::Shop)).await.unwrap();
        let profile = profiles.get_shop_profile(user.id).await.unwrap().unwrap();
        assert_eq!(profile.business_name, "Dana's Hardware");

        let err = users
            .create_user(new_user("shop@example.com", AccountType::Customer))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(msg) if msg == "Email already registered"));
    }
}
