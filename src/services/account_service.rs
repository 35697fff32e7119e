use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::account::Account;

#[derive(Clone)]
pub struct AccountService {
    pool: SqlitePool,
}

impl AccountService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<Account> {
        let existing: Option<String> =
            sqlx::query_scalar(r#"SELECT id FROM accounts WHERE username = ?1"#)
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
        if existing.is_some() {
            return Err(Error::Conflict("Username already exists".to_string()));
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::Internal(format!("Failed to hash password: {}", e)))?
            .to_string();

        let account = Account {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            password_hash,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"INSERT INTO accounts (id, username, password_hash, created_at)
               VALUES (?1, ?2, ?3, ?4)"#,
        )
        .bind(&account.id)
        .bind(&account.username)
        .bind(&account.password_hash)
        .bind(account.created_at)
        .execute(&self.pool)
        .await?;

        tracing::info!(account_id = %account.id, "Registered account");
        Ok(account)
    }

    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Account> {
        let account: Option<Account> =
            sqlx::query_as(r#"SELECT * FROM accounts WHERE username = ?1"#)
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;

        // One error for both unknown user and bad password.
        let account = account
            .ok_or_else(|| Error::Unauthorized("Invalid username or password".to_string()))?;

        let parsed = PasswordHash::new(&account.password_hash)
            .map_err(|e| Error::Internal(format!("Stored hash is malformed: {}", e)))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| Error::Unauthorized("Invalid username or password".to_string()))?;

        Ok(account)
    }

    pub async fn account_by_id(&self, id: &str) -> Result<Account> {
        let account: Option<Account> = sqlx::query_as(r#"SELECT * FROM accounts WHERE id = ?1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        account.ok_or_else(|| Error::NotFound("Account not found".to_string()))
    }
}
