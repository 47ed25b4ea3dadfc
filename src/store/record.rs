//! The per-user Google token record and the merge patch used to write it.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

use crate::providers::TokenSet;

pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";
pub const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/calendar.events";
pub const DEFAULT_EXPIRES_IN: i64 = 3600;

/// A record counts as expired this long before its real expiry.
pub const EXPIRY_SKEW_SECS: i64 = 5 * 60;

/// Latest Google tokens for one user. Field names on the wire match the
/// documents the mobile client already reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(
        rename = "fechaObtencion",
        serialize_with = "serialize_opt_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub obtained_at: Option<DateTime<Utc>>,
    #[serde(rename = "fechaActualizacion", serialize_with = "serialize_timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl TokenRecord {
    /// Expired, or within [`EXPIRY_SKEW_SECS`] of expiring.
    ///
    /// `expires_in` is computed at the last write, so the countdown starts at
    /// `updated_at`, not at the original exchange.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let expires_at = self.updated_at + chrono::Duration::seconds(self.expires_in);
        (expires_at - now).num_seconds() < EXPIRY_SKEW_SECS
    }
}

/// A merge write. `None` leaves the stored column untouched, so a patch can
/// never clear a refresh token or an obtained-at timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenPatch {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub obtained_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TokenPatch {
    /// Apply the patch over an existing record, or build a fresh one.
    ///
    /// Returns `None` when there is no existing record and the patch lacks the
    /// fields a record cannot exist without.
    pub fn apply(&self, existing: Option<&TokenRecord>) -> Option<TokenRecord> {
        let access_token = self
            .access_token
            .clone()
            .or_else(|| existing.map(|r| r.access_token.clone()))?;
        let updated_at = self.updated_at.or_else(|| existing.map(|r| r.updated_at))?;

        Some(TokenRecord {
            access_token,
            token_type: self
                .token_type
                .clone()
                .or_else(|| existing.map(|r| r.token_type.clone()))
                .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string()),
            expires_in: self
                .expires_in
                .or_else(|| existing.map(|r| r.expires_in))
                .unwrap_or(DEFAULT_EXPIRES_IN),
            refresh_token: self
                .refresh_token
                .clone()
                .or_else(|| existing.and_then(|r| r.refresh_token.clone())),
            scope: self
                .scope
                .clone()
                .or_else(|| existing.and_then(|r| r.scope.clone())),
            obtained_at: self.obtained_at.or_else(|| existing.and_then(|r| r.obtained_at)),
            updated_at,
        })
    }
}

/// Seconds until the access token in `tokens` expires.
///
/// An absolute `expiry_date` wins over a relative `expires_in`; zero values
/// count as absent. Falls back to one hour.
pub fn compute_expires_in(tokens: &TokenSet, now: DateTime<Utc>) -> i64 {
    if let Some(expiry_ms) = tokens.expiry_date.filter(|ms| *ms != 0) {
        return (expiry_ms - now.timestamp_millis()).div_euclid(1000);
    }
    tokens
        .expires_in
        .filter(|secs| *secs != 0)
        .unwrap_or(DEFAULT_EXPIRES_IN)
}

/// ISO-8601 with millisecond precision and a `Z` suffix.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_timestamp(ts))
}

pub fn serialize_opt_timestamp<S: Serializer>(
    ts: &Option<DateTime<Utc>>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match ts {
        Some(ts) => s.serialize_str(&format_timestamp(ts)),
        None => s.serialize_none(),
    }
}
