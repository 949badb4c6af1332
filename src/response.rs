use serde::{Deserialize, Serialize};
use url::Url;

/// Query parameters of the redirect the provider sends back after an authorization request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CallbackResponse {
    Code {
        code: Option<String>,
        state: Option<String>,
    },
    Error {
        state: Option<String>,
        error_response: ErrorResponse,
    },
}

impl CallbackResponse {
    pub(crate) fn from_url(url: &Url) -> Self {
        let mut code = None;
        let mut state = None;
        let mut error = None;
        let mut error_description = None;
        let mut error_uri = None;
        for (key, value) in url.query_pairs() {
            let value = Some(value.into_owned());
            match key.as_ref() {
                "code" => code = value,
                "state" => state = value,
                "error" => error = value,
                "error_description" => error_description = value,
                "error_uri" => error_uri = value,
                _ => {}
            }
        }

        match error {
            Some(error) => CallbackResponse::Error {
                state,
                error_response: ErrorResponse {
                    error: OidcErrorCode::parse(&error),
                    error_description,
                    error_uri,
                },
            },
            None => CallbackResponse::Code { code, state },
        }
    }

    pub(crate) fn state(&self) -> Option<&str> {
        match self {
            CallbackResponse::Code { state, .. } | CallbackResponse::Error { state, .. } => {
                state.as_deref()
            }
        }
    }
}

/// An enumeration representing the response to token requests, including
/// success and error responses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub(crate) enum TokenResponse {
    Success(SuccessTokenResponse),
    Error(ErrorResponse),
}

/// See [RFC 6749 Section 5.1](https://datatracker.ietf.org/doc/html/rfc6749#section-5.1).
///
/// `id_token` is optional on the wire. Providers commonly omit it on refresh grants and a missing
/// one is rejected during validation, not during decoding.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub(crate) struct SuccessTokenResponse {
    pub access_token: String,
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub scope: Option<String>,
}

/// Error codes defined for the token endpoint in
/// [RFC 6749 Section 5.2](https://datatracker.ietf.org/doc/html/rfc6749#section-5.2) and for the
/// authorization endpoint in
/// [RFC 6749 Section 4.1.2.1](https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1) and
/// [OIDC Core Section 3.1.2.6](https://openid.net/specs/openid-connect-core-1_0.html#AuthError).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum KnownOidcErrorCode {
    /// The request is missing a required parameter, includes an unsupported parameter value
    /// (other than grant type), repeats a parameter, includes multiple credentials,
    /// utilizes more than one mechanism for authenticating the client, or is otherwise malformed.
    #[serde(rename = "invalid_request")]
    InvalidRequest,

    /// Client authentication failed (e.g., unknown client, no client authentication included,
    /// or unsupported authentication method).
    #[serde(rename = "invalid_client")]
    InvalidClient,

    /// The provided authorization grant (e.g., authorization code, resource owner credentials) or
    /// refresh token is invalid, expired, revoked, does not match the redirection URI used in the
    /// authorization request, or was issued to another client.
    #[serde(rename = "invalid_grant")]
    InvalidGrant,

    /// The authenticated client is not authorized to use this authorization grant type.
    #[serde(rename = "unauthorized_client")]
    UnauthorizedClient,

    /// The authorization grant type is not supported by the authorization server.
    #[serde(rename = "unsupported_grant_type")]
    UnsupportedGrantType,

    /// The requested scope is invalid, unknown, malformed, or exceeds the scope granted by the
    /// resource owner.
    #[serde(rename = "invalid_scope")]
    InvalidScope,

    /// The resource owner or authorization server denied the request.
    #[serde(rename = "access_denied")]
    AccessDenied,

    /// The authorization server encountered an unexpected condition.
    #[serde(rename = "server_error")]
    ServerError,

    /// The authorization server is currently unable to handle the request.
    #[serde(rename = "temporarily_unavailable")]
    TemporarilyUnavailable,

    /// The request was sent with `prompt=none` (or an expired `max_age`), but the user must log in.
    #[serde(rename = "login_required")]
    LoginRequired,

    /// The request was sent with `prompt=none`, but the user must give consent.
    #[serde(rename = "consent_required")]
    ConsentRequired,

    /// The request was sent with `prompt=none`, but some user interaction is required.
    #[serde(rename = "interaction_required")]
    InteractionRequired,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum OidcErrorCode {
    Known(KnownOidcErrorCode),
    Unknown(String),
}

impl OidcErrorCode {
    pub(crate) fn parse(code: &str) -> Self {
        serde_json::from_value(serde_json::Value::String(code.to_owned()))
            .unwrap_or_else(|_| OidcErrorCode::Unknown(code.to_owned()))
    }
}

impl std::fmt::Display for OidcErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OidcErrorCode::Known(known) => match serde_json::to_value(known) {
                Ok(serde_json::Value::String(code)) => f.write_str(&code),
                _ => write!(f, "{known:?}"),
            },
            OidcErrorCode::Unknown(code) => f.write_str(code),
        }
    }
}

/// OAuth/OIDC error response received from the provider.
///
/// Returned by the authorization endpoint (as callback query parameters) and by the token and
/// userinfo endpoints (as JSON body).
///
/// See [RFC 6749 Section 5.2](https://datatracker.ietf.org/doc/html/rfc6749#section-5.2) for details.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ErrorResponse {
    /// The error code (e.g., `invalid_client` or `invalid_grant`).
    pub error: OidcErrorCode,

    /// OPTIONAL. Human-readable ASCII text providing additional information.
    pub error_description: Option<String>,

    /// OPTIONAL. A URI identifying a human-readable web page with information about the error.
    pub error_uri: Option<String>,
}

impl ErrorResponse {
    /// Check if this represents an invalid or expired refresh token.
    pub fn is_invalid_refresh_token(&self) -> bool {
        self.error == OidcErrorCode::Known(KnownOidcErrorCode::InvalidGrant)
            && self
                .error_description
                .as_deref()
                .unwrap_or_default()
                .eq_ignore_ascii_case("Invalid refresh token")
    }

    /// Any `invalid_grant` error suggests the session or token is no longer valid and a new
    /// interactive login is needed.
    pub fn is_likely_session_ended(&self) -> bool {
        self.error == OidcErrorCode::Known(KnownOidcErrorCode::InvalidGrant)
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error_description {
            Some(description) => write!(f, "{}: {description}", self.error),
            None => write!(f, "{}", self.error),
        }
    }
}
