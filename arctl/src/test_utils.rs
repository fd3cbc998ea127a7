//! Shared helpers for unit and HTTP tests.

use crate::{
    Application, BackgroundServices,
    auth::{current_user::CurrentUser, session::create_session_token},
    config::{Config, DatabaseConfig, PoolSettings},
    types::{Operation, PermissionSet, Resource},
};
use axum_test::TestServer;
use sqlx::PgPool;
use uuid::Uuid;

/// Configuration for tests. The database points at a port nothing listens on, so anything
/// that really connects fails fast with a connection error.
pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        secret_key: Some("arctl-test-secret-key".to_string()),
        database: DatabaseConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            run_migrations: false,
            pool: PoolSettings {
                max_connections: 2,
                min_connections: 0,
                acquire_timeout_secs: 1,
                ..Default::default()
            },
            ..Default::default()
        },
        ..Default::default()
    }
}

/// An in-memory caller holding exactly the given permissions.
pub fn create_test_user(grants: &[(Resource, Operation)]) -> CurrentUser {
    let mut permissions = PermissionSet::default();
    for (resource, operation) in grants {
        permissions.grant(*resource, *operation);
    }
    let id = Uuid::new_v4();
    CurrentUser {
        id,
        username: format!("user-{}", &id.simple().to_string()[..8]),
        permissions,
    }
}

/// A `Cookie` header value carrying a valid session for `user`.
pub fn session_cookie(user: &CurrentUser, config: &Config) -> String {
    let token = create_session_token(user, config).expect("Failed to create session token");
    format!("{}={}", config.auth.session.cookie_name, token)
}

pub async fn create_test_app(config: Config) -> (TestServer, BackgroundServices) {
    Application::new(config)
        .await
        .expect("Failed to create application")
        .into_test_server()
}

pub async fn create_test_app_with_pool(pool: PgPool) -> (TestServer, BackgroundServices) {
    Application::new_with_pool(create_test_config(), pool)
        .await
        .expect("Failed to create application")
        .into_test_server()
}
