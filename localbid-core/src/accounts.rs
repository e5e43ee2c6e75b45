use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Customer,
    Shop,
    Admin,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Customer => "customer",
            AccountType::Shop => "shop",
            AccountType::Admin => "admin",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(AccountType::Customer),
            "shop" => Ok(AccountType::Shop),
            "admin" => Ok(AccountType::Admin),
            other => Err(CoreError::InternalError(format!("unknown account type {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }
}

impl FromStr for UserRole {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            other => Err(CoreError::InternalError(format!("unknown role {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Subscription {
    #[default]
    Free,
    Professional,
    Enterprise,
}

impl Subscription {
    pub fn as_str(&self) -> &'static str {
        match self {
            Subscription::Free => "free",
            Subscription::Professional => "professional",
            Subscription::Enterprise => "enterprise",
        }
    }
}

impl FromStr for Subscription {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Subscription::Free),
            "professional" => Ok(Subscription::Professional),
            "enterprise" => Ok(Subscription::Enterprise),
            other => Err(CoreError::InternalError(format!("unknown subscription {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub account_type: AccountType,
    pub role: UserRole,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_signed_in: DateTime<Utc>,
}

/// Input for the local email/password signup flow
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub account_type: AccountType,
    /// Required when `account_type` is `Shop`; seeds the shop profile
    pub business_name: Option<String>,
}

impl User {
    pub fn new(input: &NewUser, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: input.email.clone(),
            password_hash: Some(input.password_hash.clone()),
            name: Some(input.name.clone()),
            phone: None,
            account_type: input.account_type,
            role: UserRole::User,
            is_verified: false,
            created_at: now,
            updated_at: now,
            last_signed_in: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerProfile {
    pub user_id: Uuid,
    pub bio: Option<String>,
    pub average_rating: Decimal,
    pub total_reviews: i32,
    pub requests_created: i32,
    pub orders_completed: i32,
    pub is_premium: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustomerProfile {
    pub fn new(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            bio: None,
            average_rating: Decimal::ZERO,
            total_reviews: 0,
            requests_created: 0,
            orders_completed: 0,
            is_premium: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Editable part of a shop profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopProfileInput {
    pub business_name: String,
    pub description: Option<String>,
    pub categories: Vec<String>,
    pub service_radius_miles: i32,
    pub business_license: Option<String>,
    pub tax_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShopProfile {
    pub user_id: Uuid,
    pub business_name: String,
    pub business_license: Option<String>,
    pub tax_id: Option<String>,
    pub description: Option<String>,
    pub categories: Vec<String>,
    pub service_radius_miles: i32,
    pub average_rating: Decimal,
    pub total_reviews: i32,
    pub bids_submitted: i32,
    pub bids_won: i32,
    pub total_revenue: Decimal,
    pub subscription: Subscription,
    pub is_verified: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShopProfile {
    pub fn new(user_id: Uuid, input: ShopProfileInput, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            business_name: input.business_name,
            business_license: input.business_license,
            tax_id: input.tax_id,
            description: input.description,
            categories: input.categories,
            service_radius_miles: input.service_radius_miles,
            average_rating: Decimal::ZERO,
            total_reviews: 0,
            bids_submitted: 0,
            bids_won: 0,
            total_revenue: Decimal::ZERO,
            subscription: Subscription::Free,
            is_verified: false,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Placeholder profile created at signup, completed later through setup
    pub fn placeholder(user_id: Uuid, business_name: String, now: DateTime<Utc>) -> Self {
        Self::new(
            user_id,
            ShopProfileInput {
                business_name,
                description: None,
                categories: Vec::new(),
                service_radius_miles: 10,
                business_license: None,
                tax_id: None,
            },
            now,
        )
    }

    pub fn apply(&mut self, input: ShopProfileInput, now: DateTime<Utc>) {
        self.business_name = input.business_name;
        self.description = input.description;
        self.categories = input.categories;
        self.service_radius_miles = input.service_radius_miles;
        self.business_license = input.business_license;
        self.tax_id = input.tax_id;
        self.updated_at = now;
    }

    pub fn analytics(&self) -> localbid_order::ShopAnalytics {
        localbid_order::ShopAnalytics::new(
            self.bids_submitted,
            self.bids_won,
            self.total_revenue,
            self.average_rating,
            self.total_reviews,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_is_never_serialized() {
        let input = NewUser {
            email: "maker@example.com".to_string(),
            name: "Maker".to_string(),
            password_hash: "$2b$12$secret".to_string(),
            account_type: AccountType::Customer,
            business_name: None,
        };
        let user = User::new(&input, Utc::now());

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["account_type"], "customer");
    }

    #[test]
    fn test_shop_profile_apply_keeps_counters() {
        let now = Utc::now();
        let mut profile = ShopProfile::placeholder(Uuid::new_v4(), "Corner Hardware".to_string(), now);
        profile.bids_submitted = 4;

        profile.apply(
            ShopProfileInput {
                business_name: "Corner Hardware & Paint".to_string(),
                description: Some("Since 1982".to_string()),
                categories: vec!["Tools".to_string()],
                service_radius_miles: 15,
                business_license: None,
                tax_id: None,
            },
            now,
        );

        assert_eq!(profile.business_name, "Corner Hardware & Paint");
        assert_eq!(profile.bids_submitted, 4);
        assert_eq!(profile.service_radius_miles, 15);
    }
}
