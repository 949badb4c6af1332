use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::OffsetDateTime;

/// See: <https://openid.net/specs/openid-connect-core-1_0.html#IDToken>
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub(crate) struct StandardIdTokenClaims {
    pub(crate) iss: String,
    pub(crate) sub: String,
    pub(crate) aud: Audiences,
    pub(crate) exp: i64,
    pub(crate) iat: i64,
    pub(crate) nbf: Option<i64>,
    pub(crate) auth_time: Option<i64>,
    pub(crate) nonce: Option<String>,
    pub(crate) acr: Option<String>,
    pub(crate) amr: Option<Vec<String>>,
    pub(crate) azp: Option<String>,
    #[serde(flatten)]
    pub(crate) remaining: HashMap<String, serde_json::Value>,
}

/// The `aud` claim. OpenID Connect allows either a single string or an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Audiences {
    Single(String),
    Multiple(Vec<String>),
}

impl Audiences {
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audiences::Single(single) => single == audience,
            Audiences::Multiple(multiple) => multiple.iter().any(|it| it == audience),
        }
    }
}

/// Validated claims of an ID token.
///
/// See: <https://openid.net/specs/openid-connect-core-1_0.html#IDToken>
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IdTokenClaims {
    /// (`iss`) Issuer Identifier for the Issuer of the response.
    pub issuer: String,

    /// (`sub`) Subject Identifier. A locally unique and never reassigned identifier within the
    /// Issuer for the End-User.
    pub subject_identifier: String,

    /// (`aud`) Audience(s) this ID Token is intended for. Contains the client id.
    pub audiences: Audiences,

    /// (`exp`) Expiration time on or after which the ID Token must not be accepted.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// (`iat`) Time at which the JWT was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,

    /// (`nbf`) Time before which the ID Token must not be accepted.
    #[serde(with = "time::serde::rfc3339::option")]
    pub not_before: Option<OffsetDateTime>,

    /// (`auth_time`) Time when the End-User authentication occurred. Always present when a
    /// `max_age` was requested.
    #[serde(with = "time::serde::rfc3339::option")]
    pub auth_time: Option<OffsetDateTime>,

    /// (`nonce`) Passed through unmodified from the authentication request.
    pub nonce: Option<String>,

    /// (`acr`) Authentication Context Class Reference.
    pub auth_context_class_reference: Option<String>,

    /// (`amr`) Authentication Methods References.
    pub authentication_methods_references: Option<Vec<String>>,

    /// (`azp`) Authorized party, the party to which the ID Token was issued.
    pub authorized_party: Option<String>,

    pub name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub preferred_username: Option<String>,
    pub email: Option<String>,
    pub email_verified: Option<bool>,

    /// Every claim not listed above.
    pub additional_claims: HashMap<String, serde_json::Value>,
}

fn timestamp(claim: &'static str, value: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(value).unwrap_or_else(|err| {
        tracing::warn!(?err, claim, value, "Token contained a timestamp out of range. Clamping it.");
        match value.is_negative() {
            true => OffsetDateTime::UNIX_EPOCH,
            false => time::PrimitiveDateTime::MAX.assume_utc(),
        }
    })
}

fn take<T: serde::de::DeserializeOwned>(
    remaining: &mut HashMap<String, serde_json::Value>,
    claim: &str,
) -> Option<T> {
    remaining
        .remove(claim)
        .and_then(|it| serde_json::from_value(it).ok())
}

impl From<StandardIdTokenClaims> for IdTokenClaims {
    fn from(mut raw: StandardIdTokenClaims) -> Self {
        Self {
            issuer: raw.iss,
            subject_identifier: raw.sub,
            audiences: raw.aud,
            expires_at: timestamp("exp", raw.exp),
            issued_at: timestamp("iat", raw.iat),
            not_before: raw.nbf.map(|nbf| timestamp("nbf", nbf)),
            auth_time: raw.auth_time.map(|auth_time| timestamp("auth_time", auth_time)),
            nonce: raw.nonce,
            auth_context_class_reference: raw.acr,
            authentication_methods_references: raw.amr,
            authorized_party: raw.azp,
            name: take(&mut raw.remaining, "name"),
            given_name: take(&mut raw.remaining, "given_name"),
            family_name: take(&mut raw.remaining, "family_name"),
            preferred_username: take(&mut raw.remaining, "preferred_username"),
            email: take(&mut raw.remaining, "email"),
            email_verified: take(&mut raw.remaining, "email_verified"),
            additional_claims: raw.remaining,
        }
    }
}
