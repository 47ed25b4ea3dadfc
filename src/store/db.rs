//! PostgreSQL-backed token store.
//!
//! Table:
//! - `google_tokens`: one row per user holding the latest Google tokens. Token
//!   columns are sealed with [`TokenCipher`] when an encryption key is set.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::record::{DEFAULT_EXPIRES_IN, DEFAULT_TOKEN_TYPE};
use super::{TokenPatch, TokenRecord, TokenStore};
use crate::crypto::TokenCipher;
use crate::error::TokenError;

const RECORD_COLUMNS: &str =
    "access_token, token_type, expires_in, refresh_token, scope, obtained_at, updated_at";

/// Token store backed by PostgreSQL.
pub struct PgTokenStore {
    pool: PgPool,
    cipher: TokenCipher,
}

impl PgTokenStore {
    pub async fn new(db_url: &str, cipher: TokenCipher) -> Result<Self, TokenError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(db_url)
            .await
            .map_err(|e| TokenError::Database(format!("Failed to connect to PostgreSQL: {e}")))?;

        Ok(Self { pool, cipher })
    }

    /// Run schema migrations.
    pub async fn migrate(&self) -> Result<(), TokenError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS google_tokens (
                user_id         TEXT PRIMARY KEY,
                access_token    TEXT NOT NULL,
                token_type      TEXT NOT NULL DEFAULT 'Bearer',
                expires_in      BIGINT NOT NULL DEFAULT 3600,
                refresh_token   TEXT,
                scope           TEXT,
                obtained_at     TIMESTAMPTZ,
                updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn seal_opt(&self, value: Option<&str>) -> Result<Option<String>, TokenError> {
        value.map(|v| self.cipher.seal(v)).transpose()
    }

    fn row_to_record(&self, row: &PgRow) -> Result<TokenRecord, TokenError> {
        let sealed_access: String = row.try_get("access_token")?;
        let sealed_refresh: Option<String> = row.try_get("refresh_token")?;

        Ok(TokenRecord {
            access_token: self.cipher.open(&sealed_access)?,
            token_type: row.try_get("token_type")?,
            expires_in: row.try_get("expires_in")?,
            refresh_token: match sealed_refresh {
                Some(ref rt) if !rt.is_empty() => Some(self.cipher.open(rt)?),
                _ => None,
            },
            scope: row.try_get("scope")?,
            obtained_at: row.try_get::<Option<DateTime<Utc>>, _>("obtained_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn get(&self, user_id: &str) -> Result<Option<TokenRecord>, TokenError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM google_tokens WHERE user_id = $1");
        let row = sqlx::query(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| self.row_to_record(&r)).transpose()
    }

    async fn merge(&self, user_id: &str, patch: &TokenPatch) -> Result<TokenRecord, TokenError> {
        let access_token = patch.access_token.as_deref().ok_or_else(|| {
            TokenError::Internal("cannot write a token record without an access token".into())
        })?;

        // Absent patch fields bind as NULL; COALESCE keeps the stored value.
        let sql = format!(
            r#"
            INSERT INTO google_tokens
                (user_id, access_token, token_type, expires_in, refresh_token, scope,
                 obtained_at, updated_at)
            VALUES ($1, $2, COALESCE($3, '{DEFAULT_TOKEN_TYPE}'), COALESCE($4, {DEFAULT_EXPIRES_IN}),
                    $5, $6, $7, COALESCE($8, NOW()))
            ON CONFLICT (user_id)
            DO UPDATE SET
                access_token  = EXCLUDED.access_token,
                token_type    = COALESCE($3, google_tokens.token_type),
                expires_in    = COALESCE($4, google_tokens.expires_in),
                refresh_token = COALESCE($5, google_tokens.refresh_token),
                scope         = COALESCE($6, google_tokens.scope),
                obtained_at   = COALESCE($7, google_tokens.obtained_at),
                updated_at    = COALESCE($8, NOW())
            RETURNING {RECORD_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(self.cipher.seal(access_token)?)
            .bind(&patch.token_type)
            .bind(patch.expires_in)
            .bind(self.seal_opt(patch.refresh_token.as_deref())?)
            .bind(&patch.scope)
            .bind(patch.obtained_at)
            .bind(patch.updated_at)
            .fetch_one(&self.pool)
            .await?;

        self.row_to_record(&row)
    }

    async fn delete(&self, user_id: &str) -> Result<bool, TokenError> {
        let affected = sqlx::query("DELETE FROM google_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(affected > 0)
    }
}
