pub mod auth;
pub mod rate_limit;

pub use auth::{
    customer_auth_middleware, session_middleware, shop_auth_middleware, CurrentUser, SessionClaims,
};
pub use rate_limit::rate_limit_middleware;
