use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Json, Router,
};
use localbid_core::accounts::{AccountType, NewUser, User};
use localbid_shared::Masked;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use validator::{Validate, ValidationError};

use crate::{
    error::AppError,
    extract::{trimmed_length, ValidatedJson},
    middleware::{auth::issue_token, session_middleware, CurrentUser},
    state::AppState,
};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "check_signup"))]
pub struct SignupRequest {
    #[validate(custom(function = "check_name"))]
    pub name: String,
    #[validate(email(message = "email is invalid"))]
    pub email: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
    pub account_type: AccountType,
    pub business_name: Option<String>,
}

fn check_name(name: &str) -> Result<(), ValidationError> {
    trimmed_length(name, 2, 255, "name must be 2-255 characters")
}

fn check_signup(req: &SignupRequest) -> Result<(), ValidationError> {
    match (req.account_type, req.business_name.as_deref()) {
        (AccountType::Admin, _) => Err(ValidationError::new("account_type")
            .with_message("account_type must be customer or shop".into())),
        (AccountType::Shop, None) => Err(ValidationError::new("business_name")
            .with_message("business_name is required for shop accounts".into())),
        (AccountType::Shop, Some(name)) => {
            trimmed_length(name, 2, 255, "business_name must be 2-255 characters")
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AccountTypeRequest {
    pub account_type: AccountType,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

pub fn routes(state: AppState) -> Router<AppState> {
    let session = Router::new()
        .route("/me", get(me))
        .route("/logout", post(logout))
        .route("/account-type", post(switch_account_type))
        .route_layer(from_fn_with_state(state, session_middleware));

    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .merge(session)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/auth/signup
async fn signup(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let email = normalize_email(&req.email);
    let cost = state.auth.bcrypt_cost;
    let password = req.password;
    let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .context("password hashing task failed")?
        .context("password hashing failed")?;

    let user = state
        .users
        .create_user(NewUser {
            email,
            name: req.name.trim().to_string(),
            password_hash,
            account_type: req.account_type,
            business_name: req.business_name.map(|name| name.trim().to_string()),
        })
        .await?;

    info!(
        user_id = %user.id,
        email = %Masked::new(&user.email),
        account_type = %user.account_type,
        "Account created"
    );

    let token = issue_token(&state.auth, user.id)?;
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

/// POST /v1/auth/login
async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let invalid = || AppError::AuthenticationError("Invalid email or password".to_string());

    let user = state
        .users
        .find_user_by_email(&normalize_email(&req.email))
        .await?
        .ok_or_else(invalid)?;
    let hash = user.password_hash.clone().ok_or_else(invalid)?;

    let password = req.password;
    let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .context("password verification task failed")?
        // A malformed stored hash is treated like a wrong password
        .unwrap_or(false);
    if !matches {
        return Err(invalid());
    }

    state.users.record_sign_in(user.id).await?;
    info!(user_id = %user.id, "Signed in");

    let token = issue_token(&state.auth, user.id)?;
    Ok(Json(AuthResponse { token, user }))
}

/// GET /v1/auth/me
async fn me(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<User> {
    Json(user)
}

/// POST /v1/auth/logout
/// Tokens are stateless; the client discards its copy.
async fn logout(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<Value> {
    info!(user_id = %user.id, "Signed out");
    Json(json!({ "success": true }))
}

/// POST /v1/auth/account-type
async fn switch_account_type(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ValidatedJson(req): ValidatedJson<AccountTypeRequest>,
) -> Result<Json<User>, AppError> {
    if req.account_type == AccountType::Admin {
        return Err(AppError::ValidationError(
            "account_type must be customer or shop".to_string(),
        ));
    }

    let updated = state.users.set_account_type(user.id, req.account_type).await?;
    info!(user_id = %updated.id, account_type = %updated.account_type, "Account type switched");
    Ok(Json(updated))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(account_type: AccountType, business_name: Option<&str>) -> SignupRequest {
        SignupRequest {
            name: "Dana".to_string(),
            email: "dana@example.com".to_string(),
            password: "correct horse".to_string(),
            account_type,
            business_name: business_name.map(str::to_string),
        }
    }

    #[test]
    fn test_shop_signup_needs_business_name() {
        assert!(signup(AccountType::Shop, None).validate().is_err());
        assert!(signup(AccountType::Shop, Some("  ")).validate().is_err());
        assert!(signup(AccountType::Shop, Some("Dana's Deli")).validate().is_ok());
        assert!(signup(AccountType::Customer, None).validate().is_ok());
    }

    #[test]
    fn test_business_name_length_is_bounded() {
        let too_short = AppError::from(signup(AccountType::Shop, Some(" A ")).validate().unwrap_err());
        assert_eq!(too_short.to_string(), "business_name must be 2-255 characters");
        assert!(signup(AccountType::Shop, Some("AB")).validate().is_ok());

        let longest = "b".repeat(255);
        assert!(signup(AccountType::Shop, Some(&longest)).validate().is_ok());
        let too_long = "b".repeat(256);
        assert!(signup(AccountType::Shop, Some(&too_long)).validate().is_err());
    }

    #[test]
    fn test_admin_signup_is_rejected() {
        assert!(signup(AccountType::Admin, None).validate().is_err());
    }

    #[test]
    fn test_email_is_normalized() {
        assert_eq!(normalize_email("  Dana@Example.COM "), "dana@example.com");
    }
}
