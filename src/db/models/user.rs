//! User and session models.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// Maximum length of a generated username
const USERNAME_MAX_LEN: usize = 30;

/// Account role. ADMIN may manage users and act inside other users' scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::User => write!(f, "USER"),
            UserRole::Admin => write!(f, "ADMIN"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "USER" => Ok(UserRole::User),
            "ADMIN" => Ok(UserRole::Admin),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub username: Option<String>,
    pub role: UserRole,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub username: Option<String>,
    pub role: UserRole,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            username: user.username,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Compact user reference embedded in other resources
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Login body. Fields are optional so a missing one is a 400, not a parse error.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
    pub user_role: UserRole,
}

impl From<&User> for LoginResponse {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            user_name: user.name.clone(),
            user_email: user.email.clone(),
            user_role: user.role,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Admin-side account creation
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<UserRole>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub role: Option<UserRole>,
}

/// Row data for a new account; the password is already hashed
#[derive(Debug)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub username: Option<&'a str>,
    pub role: UserRole,
}

pub async fn find_user_by_id(db: &SqlitePool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn find_user_by_email(db: &SqlitePool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(db)
        .await
}

pub async fn list_users(db: &SqlitePool) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
        .fetch_all(db)
        .await
}

pub async fn insert_user(db: &SqlitePool, new_user: NewUser<'_>) -> Result<User, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO users (id, name, email, password_hash, username, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(new_user.name)
    .bind(new_user.email)
    .bind(new_user.password_hash)
    .bind(new_user.username)
    .bind(new_user.role)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(db)
        .await
}

/// Apply a partial profile/role change. Returns the number of rows touched.
pub async fn update_user(
    db: &SqlitePool,
    id: &str,
    name: Option<&str>,
    role: Option<UserRole>,
) -> Result<u64, sqlx::Error> {
    let now = chrono::Utc::now().to_rfc3339();

    let result = sqlx::query(
        r#"
        UPDATE users SET
            name = COALESCE(?, name),
            role = COALESCE(?, role),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(name)
    .bind(role)
    .bind(&now)
    .bind(id)
    .execute(db)
    .await?;

    Ok(result.rows_affected())
}

pub async fn delete_user(db: &SqlitePool, id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}

/// Username stem derived from the local part of an email address
pub fn username_base(email: &str) -> Option<String> {
    let local = email.split('@').next().unwrap_or_default();
    let local = if local.is_empty() { "user" } else { local };

    let base: String = local
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-' | '.'))
        .take(USERNAME_MAX_LEN)
        .collect();

    if base.is_empty() {
        None
    } else {
        Some(base)
    }
}

/// The `counter`-th alternative for a taken username, still within the length cap
pub fn username_candidate(base: &str, counter: u32) -> String {
    let suffix = counter.to_string();
    let keep = USERNAME_MAX_LEN.saturating_sub(suffix.len());
    let stem: String = base.chars().take(keep).collect();
    format!("{}{}", stem, suffix)
}

/// Pick the first free username for an email address, if one can be derived
pub async fn next_free_username(db: &SqlitePool, email: &str) -> Result<Option<String>, sqlx::Error> {
    let Some(base) = username_base(email) else {
        return Ok(None);
    };

    let mut candidate = base.clone();
    let mut counter = 1;
    loop {
        let taken: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE username = ?")
            .bind(&candidate)
            .fetch_optional(db)
            .await?;
        if taken.is_none() {
            return Ok(Some(candidate));
        }
        candidate = username_candidate(&base, counter);
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip_strings() {
        assert_eq!("admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!("USER".parse::<UserRole>().unwrap(), UserRole::User);
        assert!("owner".parse::<UserRole>().is_err());
        assert_eq!(UserRole::Admin.to_string(), "ADMIN");
    }

    #[test]
    fn test_username_base() {
        assert_eq!(username_base("Jane.Doe@example.com").as_deref(), Some("jane.doe"));
        assert_eq!(username_base("a+b@example.com").as_deref(), Some("ab"));
        assert_eq!(username_base("@example.com").as_deref(), Some("user"));
        assert_eq!(username_base("++@example.com"), None);

        let long = format!("{}@example.com", "x".repeat(50));
        assert_eq!(username_base(&long).unwrap().len(), 30);
    }

    #[test]
    fn test_username_candidate_respects_cap() {
        assert_eq!(username_candidate("jane", 1), "jane1");
        let base = "y".repeat(30);
        let candidate = username_candidate(&base, 12);
        assert_eq!(candidate.len(), 30);
        assert!(candidate.ends_with("12"));
    }

    #[tokio::test]
    async fn test_next_free_username_skips_taken() {
        let db = crate::db::init_in_memory().await.unwrap();
        insert_user(
            &db,
            NewUser {
                name: "Jane",
                email: "jane@one.test",
                password_hash: "x",
                username: Some("jane"),
                role: UserRole::User,
            },
        )
        .await
        .unwrap();

        let next = next_free_username(&db, "jane@two.test").await.unwrap();
        assert_eq!(next.as_deref(), Some("jane1"));
    }

    #[tokio::test]
    async fn test_update_and_delete_report_rows() {
        let db = crate::db::init_in_memory().await.unwrap();
        let user = insert_user(
            &db,
            NewUser {
                name: "Sam",
                email: "sam@example.com",
                password_hash: "x",
                username: None,
                role: UserRole::User,
            },
        )
        .await
        .unwrap();

        assert_eq!(update_user(&db, &user.id, None, Some(UserRole::Admin)).await.unwrap(), 1);
        let reloaded = find_user_by_id(&db, &user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.role, UserRole::Admin);
        assert_eq!(reloaded.name, "Sam");

        assert_eq!(update_user(&db, "missing", Some("x"), None).await.unwrap(), 0);
        assert_eq!(delete_user(&db, &user.id).await.unwrap(), 1);
        assert_eq!(delete_user(&db, &user.id).await.unwrap(), 0);
    }
}
