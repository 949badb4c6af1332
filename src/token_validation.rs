use std::time::Duration;

use jsonwebtoken::errors::ErrorKind;
use snafu::{OptionExt, Snafu, ensure};
use time::OffsetDateTime;

use crate::jwk::FilteredKeySet;
use crate::time_ext::StdDurationExt;
use crate::token_claims::{IdTokenClaims, StandardIdTokenClaims};

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum TokenValidationError {
    #[snafu(display("TokenValidationError: Malformed token: {reason}"))]
    MalformedToken { reason: String },

    #[snafu(display("TokenValidationError: Signature could not be verified: {reason}"))]
    SignatureInvalid { reason: String },

    #[snafu(display("TokenValidationError: Expected issuer '{expected}', got '{actual}'"))]
    IssuerMismatch { expected: String, actual: String },

    #[snafu(display("TokenValidationError: Token is not intended for audience '{expected}'"))]
    AudienceMismatch { expected: String },

    #[snafu(display("TokenValidationError: Token is expired or not yet valid"))]
    TokenExpired,

    #[snafu(display("TokenValidationError: Nonce does not match the one of this login attempt"))]
    NonceMismatch,

    #[snafu(display("TokenValidationError: Last authentication is longer ago than allowed"))]
    MaxAgeExceeded,
}

/// What every ID token accepted by a client must satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdTokenRequirements {
    /// Expected `iss`, e.g. `https://idp.example.com`. Compared ignoring a trailing slash.
    pub issuer: String,

    /// Must be contained in `aud`. This is the client id.
    pub audience: String,

    /// Tolerated clock skew for `exp`, `nbf` and `auth_time`.
    pub leeway: Duration,

    /// Maximum time since `auth_time`.
    pub max_age: Option<Duration>,
}

fn same_issuer(expected: &str, actual: &str) -> bool {
    expected.trim_end_matches('/') == actual.trim_end_matches('/')
}

fn classify(err: jsonwebtoken::errors::Error) -> TokenValidationError {
    match err.kind() {
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::MissingAlgorithm
        | ErrorKind::InvalidKeyFormat
        | ErrorKind::InvalidRsaKey(_) => TokenValidationError::SignatureInvalid {
            reason: err.to_string(),
        },
        _ => TokenValidationError::MalformedToken {
            reason: err.to_string(),
        },
    }
}

/// Verify `id_token` and check its claims, in this order: structure, signature, issuer, audience,
/// lifetime, nonce, max age. The first violated requirement is reported.
///
/// `expected_nonce` is `None` for tokens obtained without an authorization request, e.g. through
/// a refresh grant. `now` is the current time, as seen by the caller.
pub fn validate(
    requirements: &IdTokenRequirements,
    keys: &FilteredKeySet,
    id_token: &str,
    expected_nonce: Option<&str>,
    now: OffsetDateTime,
) -> Result<IdTokenClaims, TokenValidationError> {
    let header = jsonwebtoken::decode_header(id_token).map_err(|err| {
        MalformedTokenSnafu {
            reason: err.to_string(),
        }
        .build()
    })?;
    tracing::trace!(?header, "Decoded JWT header");

    let jwk = keys
        .select(header.kid.as_deref())
        .with_context(|| SignatureInvalidSnafu {
            reason: format!("no usable signing key for kid {:?}", header.kid),
        })?;
    let decoding_key = jsonwebtoken::DecodingKey::from_jwk(jwk).map_err(classify)?;

    // Only the signature is checked here. Claims are checked below, so that every violation maps
    // to its own error.
    let mut validation = jsonwebtoken::Validation::new(header.alg);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let claims = jsonwebtoken::decode::<StandardIdTokenClaims>(id_token, &decoding_key, &validation)
        .map_err(classify)?
        .claims;
    tracing::trace!(?claims, "Decoded JWT");

    ensure!(
        same_issuer(&requirements.issuer, &claims.iss),
        IssuerMismatchSnafu {
            expected: requirements.issuer.clone(),
            actual: claims.iss.clone(),
        }
    );

    ensure!(
        claims.aud.contains(&requirements.audience),
        AudienceMismatchSnafu {
            expected: requirements.audience.clone(),
        }
    );

    let now = now.unix_timestamp();
    let leeway = i64::try_from(requirements.leeway.as_secs()).unwrap_or(i64::MAX);
    ensure!(now < claims.exp.saturating_add(leeway), TokenExpiredSnafu);
    if let Some(nbf) = claims.nbf {
        ensure!(now >= nbf.saturating_sub(leeway), TokenExpiredSnafu);
    }

    if let Some(expected_nonce) = expected_nonce {
        ensure!(
            claims.nonce.as_deref() == Some(expected_nonce),
            NonceMismatchSnafu
        );
    }

    if let Some(max_age) = requirements.max_age {
        let max_age = i64::try_from(max_age.rounded_seconds()).unwrap_or(i64::MAX);
        let auth_time = claims.auth_time.context(MaxAgeExceededSnafu)?;
        ensure!(
            now.saturating_sub(auth_time) <= max_age.saturating_add(leeway),
            MaxAgeExceededSnafu
        );
    }

    Ok(IdTokenClaims::from(claims))
}
