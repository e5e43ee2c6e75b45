use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use localbid_core::accounts::{AccountType, User};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, state::{AppState, AuthConfig}};

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    /// User id
    pub sub: Uuid,
    pub iat: usize,
    pub exp: usize,
}

/// The signed-in user, loaded fresh from the store on every request
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

pub fn issue_token(auth: &AuthConfig, user_id: Uuid) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = SessionClaims {
        sub: user_id,
        iat: now.timestamp() as usize,
        exp: (now + Duration::seconds(auth.expiration as i64)).timestamp() as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(auth.secret.as_bytes()))
        .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<User, AppError> {
    let Authorization(bearer) = headers
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::AuthenticationError("Missing bearer token".to_string()))?;

    let token_data = decode::<SessionClaims>(
        bearer.token(),
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthenticationError("Invalid or expired token".to_string()))?;

    state
        .users
        .get_user(token_data.claims.sub)
        .await?
        .ok_or_else(|| AppError::AuthenticationError("Account no longer exists".to_string()))
}

// ============================================================================
// Session Middleware
// ============================================================================

/// Any signed-in account
pub async fn session_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(&state, req.headers()).await?;
    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

async fn require_account_type(
    state: &AppState,
    mut req: Request,
    next: Next,
    account_type: AccountType,
) -> Result<Response, AppError> {
    let user = authenticate(state, req.headers()).await?;
    if user.account_type != account_type {
        return Err(AppError::AuthorizationError(format!(
            "{} account required",
            account_type
        )));
    }
    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

// ============================================================================
// Role Middleware
// ============================================================================

pub async fn customer_auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    require_account_type(&state, req, next, AccountType::Customer).await
}

pub async fn shop_auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    require_account_type(&state, req, next, AccountType::Shop).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issued_token_round_trips() {
        let auth = AuthConfig {
            secret: "test-secret".to_string(),
            expiration: 3600,
            bcrypt_cost: 4,
        };
        let user_id = Uuid::new_v4();
        let token = issue_token(&auth, user_id).unwrap();

        let data = decode::<SessionClaims>(
            &token,
            &DecodingKey::from_secret(auth.secret.as_bytes()),
            &Validation::default(),
        )
        .unwrap();
        assert_eq!(data.claims.sub, user_id);
        assert!(data.claims.exp > data.claims.iat);
    }
}
