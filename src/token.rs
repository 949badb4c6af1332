use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::response::SuccessTokenResponse;

/// Tokens of a successful login or refresh. Persisting them is up to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TokenData {
    /// The validated ID token, as received.
    pub id_token: String,

    /// Allows access to resources requiring authentication unless expired.
    pub access_token: String,

    /// Point in time when the `access_token` expires. `None` if the provider did not say.
    #[serde(with = "time::serde::rfc3339::option")]
    pub access_token_expires_at: Option<OffsetDateTime>,

    /// May be used to obtain new tokens without user interaction.
    pub refresh_token: Option<String>,

    /// Point in time this token data was received.
    #[serde(with = "time::serde::rfc3339")]
    pub time_received: OffsetDateTime,
}

impl TokenData {
    pub(crate) fn new(
        response: SuccessTokenResponse,
        id_token: String,
        time_received: OffsetDateTime,
    ) -> Self {
        Self {
            id_token,
            access_token: response.access_token,
            access_token_expires_at: response
                .expires_in
                .and_then(|expires_in| expires_at(time_received, expires_in)),
            refresh_token: response.refresh_token,
            time_received,
        }
    }

    pub fn access_token_time_left(&self, now: OffsetDateTime) -> Option<Duration> {
        self.access_token_expires_at
            .map(|expires_at| expires_at - now)
    }

    pub fn access_token_expired(&self, now: OffsetDateTime) -> bool {
        self.access_token_expires_at
            .is_some_and(|expires_at| expires_at <= now)
    }
}

fn expires_at(time_received: OffsetDateTime, expires_in: i64) -> Option<OffsetDateTime> {
    let expires_at = time_received.checked_add(Duration::seconds(expires_in));
    if expires_at.is_none() {
        tracing::warn!(expires_in, "Token response contained an expiry out of range. Ignoring it.");
    }
    expires_at
}
