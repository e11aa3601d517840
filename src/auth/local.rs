//! Local auth mode: HMAC-signed tokens backed by a durable SQLite user
//! record. Passwords are stored as salted bcrypt hashes at cost ≥ 10.
//! Grounded on this codebase's sibling `auth.rs` (JWT issuance/refresh
//! shape) and `request_signing_middleware.rs` (HMAC usage), adapted to
//! back tokens with a real user table instead of an in-memory map.

use crate::error::AppError;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

const BCRYPT_COST: u32 = 12;
const TOKEN_TTL_SECS: i64 = 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalClaims {
    pub sub: String,
    pub username: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user_id: String,
    pub username: String,
    pub display_name: String,
    pub role: String,
    pub expires_in: i64,
}

pub struct LocalAuthService {
    pool: SqlitePool,
    secret: String,
}

impl LocalAuthService {
    pub fn new(pool: SqlitePool, secret: String) -> Self {
        Self { pool, secret }
    }

    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS local_users (
                user_id TEXT PRIMARY KEY,
                username TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                email TEXT,
                display_name TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'user',
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("failed to migrate local_users: {e}")))?;
        Ok(())
    }

    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
        display_name: &str,
    ) -> Result<AuthResponse, AppError> {
        let existing: Option<i64> = sqlx::query_scalar("SELECT 1 FROM local_users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("lookup failed: {e}")))?;
        if existing.is_some() {
            return Err(AppError::UsernameExists);
        }

        let password_hash = bcrypt::hash(password, BCRYPT_COST)
            .map_err(|e| AppError::Internal(format!("hashing failed: {e}")))?;
        let user_id = uuid::Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO local_users (user_id, username, password_hash, email, display_name, role, created_at) VALUES (?, ?, ?, ?, ?, 'user', ?)",
        )
        .bind(&user_id)
        .bind(username)
        .bind(&password_hash)
        .bind(email)
        .bind(display_name)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("insert failed: {e}")))?;

        self.issue_token(&user_id, username, display_name, "user")
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<AuthResponse, AppError> {
        let row = sqlx::query("SELECT user_id, password_hash, display_name, role FROM local_users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("lookup failed: {e}")))?
            .ok_or(AppError::InvalidCredentials)?;

        let user_id: String = row.try_get("user_id").map_err(|e| AppError::Internal(e.to_string()))?;
        let password_hash: String = row.try_get("password_hash").map_err(|e| AppError::Internal(e.to_string()))?;
        let display_name: String = row.try_get("display_name").map_err(|e| AppError::Internal(e.to_string()))?;
        let role: String = row.try_get("role").map_err(|e| AppError::Internal(e.to_string()))?;

        let valid = bcrypt::verify(password, &password_hash)
            .map_err(|e| AppError::Internal(format!("verify failed: {e}")))?;
        if !valid {
            return Err(AppError::InvalidCredentials);
        }

        self.issue_token(&user_id, username, &display_name, &role)
    }

    fn issue_token(
        &self,
        user_id: &str,
        username: &str,
        display_name: &str,
        role: &str,
    ) -> Result<AuthResponse, AppError> {
        let now = chrono::Utc::now().timestamp();
        let claims = LocalClaims {
            sub: user_id.to_string(),
            username: username.to_string(),
            role: role.to_string(),
            exp: now + TOKEN_TTL_SECS,
            iat: now,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("token issuance failed: {e}")))?;

        Ok(AuthResponse {
            token,
            user_id: user_id.to_string(),
            username: username.to_string(),
            display_name: display_name.to_string(),
            role: role.to_string(),
            expires_in: TOKEN_TTL_SECS,
        })
    }

    pub fn verify(&self, token: &str) -> Result<LocalClaims, AppError> {
        let data = decode::<LocalClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| AppError::InvalidToken(format!("local token invalid: {e}")))?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bcrypt_cost_meets_minimum() {
        assert!(BCRYPT_COST >= 10);
    }

    #[test]
    fn roundtrip_issue_and_verify() {
        let service = LocalAuthService::new(
            sqlx::sqlite::SqlitePoolOptions::new()
                .connect_lazy("sqlite::memory:")
                .unwrap(),
            "test-secret".to_string(),
        );
        let response = service
            .issue_token("u1", "alice", "Alice", "user")
            .unwrap();
        let claims = service.verify(&response.token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.username, "alice");
    }
}
