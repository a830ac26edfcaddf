use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::CookieJar;
use std::sync::Arc;

use super::error::{ApiError, ErrorCode, ValidationErrorBuilder};
use super::extract::JsonBody;
use super::session::SESSION_COOKIE;
use super::validation::{validate_email, validate_password, validate_text, MAX_NAME_LEN};
use crate::db::{
    self, find_user_by_email, find_user_by_id, insert_user, next_free_username, LoginRequest,
    LoginResponse, NewUser, RegisterRequest, RegisterResponse, User, UserResponse, UserRole,
};
use crate::AppState;

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Login endpoint
pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    let (Some(email), Some(password)) = (
        request.email.filter(|e| !e.is_empty()),
        request.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::bad_request("Email and password are required"));
    };

    let invalid = || ApiError::unauthorized("Invalid email or password");

    let user = find_user_by_email(&state.db, &email).await?.ok_or_else(|| {
        tracing::info!("Login failed: unknown email");
        invalid()
    })?;

    if !verify_password(&password, &user.password_hash) {
        tracing::info!(user_id = %user.id, "Login failed: wrong password");
        return Err(invalid());
    }

    let token = state.sessions.issue(&user.id).map_err(|e| {
        tracing::error!(user_id = %user.id, "Failed to sign session token: {}", e);
        ApiError::internal("Failed to generate session token")
    })?;

    tracing::info!(user_id = %user.id, "User logged in");

    let jar = jar.add(state.sessions.session_cookie(token, &headers));
    Ok((jar, Json(LoginResponse::from(&user))))
}

/// Logout endpoint; always succeeds
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
) -> impl IntoResponse {
    let jar = jar.add(state.sessions.expired_cookie(&headers));
    (StatusCode::NO_CONTENT, jar)
}

/// Self-service registration, only when enabled in configuration
pub async fn register(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    if !state.config.auth.allow_registration {
        return Err(ApiError::gone(
            "Registration is disabled. Ask an administrator to create your account.",
        ));
    }

    let mut errors = ValidationErrorBuilder::new();
    errors.check("name", validate_text(&request.name, "Name", MAX_NAME_LEN));
    errors.check("email", validate_email(&request.email));
    errors.check("password", validate_password(&request.password));
    errors.finish()?;

    if find_user_by_email(&state.db, &request.email).await?.is_some() {
        return Err(ApiError::bad_request("User already exists"));
    }

    let user = create_account(
        &state.db,
        &request.name,
        &request.email,
        &request.password,
        UserRole::User,
    )
    .await
    .map_err(|e| match e.code() {
        // Lost a race with a concurrent registration of the same address
        ErrorCode::Conflict => ApiError::bad_request("User already exists"),
        _ => e,
    })?;

    tracing::info!(user_id = %user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: user.id,
            name: user.name,
            email: user.email,
        }),
    ))
}

/// The signed-in user's profile
pub async fn session(user: User) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}

/// Hash the password, derive a free username and insert the account
pub(crate) async fn create_account(
    pool: &db::DbPool,
    name: &str,
    email: &str,
    password: &str,
    role: UserRole,
) -> Result<User, ApiError> {
    let password_hash = hash_password(password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::internal("Failed to create account")
    })?;
    let username = next_free_username(pool, email).await?;

    let user = insert_user(
        pool,
        NewUser {
            name,
            email,
            password_hash: &password_hash,
            username: username.as_deref(),
            role,
        },
    )
    .await?;
    Ok(user)
}

/// Create the configured bootstrap administrator if no account uses its email
pub async fn ensure_admin_user(pool: &db::DbPool, email: &str, password: &str) -> anyhow::Result<()> {
    if find_user_by_email(pool, email).await?.is_some() {
        tracing::debug!("Bootstrap admin {} already exists", email);
        return Ok(());
    }

    let user = create_account(pool, "Administrator", email, password, UserRole::Admin)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create bootstrap admin: {}", e))?;

    tracing::info!(user_id = %user.id, "Created bootstrap admin {}", email);
    Ok(())
}

/// Resolve the session cookie to a live user record
pub async fn get_current_user(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let jar = CookieJar::from_headers(headers);
    let token = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Unauthorized"))?;

    let user_id = state
        .sessions
        .verify(&token)
        .ok_or_else(|| ApiError::unauthorized("Unauthorized"))?;

    // A deleted account invalidates its outstanding tokens
    find_user_by_id(&state.db, &user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Unauthorized"))
}

/// Extractor for getting the current authenticated user from a request
#[async_trait]
impl FromRequestParts<Arc<AppState>> for User {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        get_current_user(state, &parts.headers).await
    }
}

/// An authenticated user holding the ADMIN role
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = get_current_user(state, &parts.headers).await?;
        if !user.is_admin() {
            tracing::warn!(user_id = %user.id, "Non-admin attempted an admin operation");
            return Err(ApiError::forbidden("Forbidden"));
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
        assert!(!verify_password("hunter22", "not-a-hash"));
    }

    #[tokio::test]
    async fn test_ensure_admin_user_is_idempotent() {
        let db = crate::db::init_in_memory().await.unwrap();
        ensure_admin_user(&db, "root@example.com", "changeme").await.unwrap();
        ensure_admin_user(&db, "root@example.com", "other").await.unwrap();

        let admin = find_user_by_email(&db, "root@example.com").await.unwrap().unwrap();
        assert_eq!(admin.role, UserRole::Admin);
        assert_eq!(admin.username.as_deref(), Some("root"));
        assert!(verify_password("changeme", &admin.password_hash));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
