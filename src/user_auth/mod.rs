//! User registration, login and bearer-token authentication
//!
//! Passwords are stored as Argon2id PHC strings; tokens are HS256 JWTs whose
//! subject is the username, which the gateway uses as `Account::owner`.

pub mod handlers;
pub mod middleware;
pub mod service;

pub use middleware::jwt_auth_middleware;
pub use service::{Claims, UserAuthService};
