//! OpenAPI Documentation
//!
//! Auto-generated OpenAPI 3.0 document for the Simple Bank API, served at
//! `http://localhost:8080/api-docs/openapi.json`.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::gateway::handlers::HealthResponse;
use crate::gateway::types::{CreateAccountRequest, TransferRequest};
use crate::models::{Account, Entry, Transfer, TransferResult};
use crate::user_auth::service::{CreateUserRequest, LoginRequest, LoginResponse, UserResponse};

/// JWT bearer authentication security scheme
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Token from POST /api/v1/users/login: Bearer {access_token}",
                        ))
                        .build(),
                ),
            );
        }
    }
}

/// Main API Documentation struct
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Simple Bank API",
        version = "0.1.0",
        description = "Accounts and atomic funds transfers between them.",
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::health::health_check,
        crate::user_auth::handlers::create_user,
        crate::user_auth::handlers::login_user,
        crate::gateway::handlers::account::create_account,
        crate::gateway::handlers::account::get_account,
        crate::gateway::handlers::account::list_accounts,
        crate::gateway::handlers::transfer::create_transfer,
    ),
    components(
        schemas(
            HealthResponse,
            CreateUserRequest,
            LoginRequest,
            LoginResponse,
            UserResponse,
            CreateAccountRequest,
            TransferRequest,
            Account,
            Entry,
            Transfer,
            TransferResult,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "User registration and login"),
        (name = "Account", description = "Account management (auth required)"),
        (name = "Transfer", description = "Funds transfers (auth required)"),
        (name = "System", description = "Health checks and system info")
    )
)]
pub struct ApiDoc;
