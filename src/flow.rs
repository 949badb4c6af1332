//! The authorization code flow, one step per type.
//!
//! ```text
//! Idle -> AwaitingCallback -> Exchanging -> Validating -> Succeeded
//!              |                  |             |
//!              +-> Cancelled      +-------------+-> Failed
//! ```
//!
//! Every step consumes the previous one, so a callback cannot be processed twice and validation
//! cannot run without an exchange.

use snafu::{ResultExt, Snafu};
use time::OffsetDateTime;
use url::Url;

use crate::browser::{BrowserResult, BrowserResultType};
use crate::code_verifier::{CodeChallenge, CodeVerifier};
use crate::config::ExtraParameters;
use crate::csrf_token::{CsrfToken, Nonce};
use crate::discovery::DiscoveryError;
use crate::jwk::FilteredKeySet;
use crate::request::{self, ClientAuthentication, RequestError};
use crate::response::{CallbackResponse, ErrorResponse, SuccessTokenResponse};
use crate::token::TokenData;
use crate::token_claims::IdTokenClaims;
use crate::token_validation::{self, IdTokenRequirements, TokenValidationError};
use crate::transport::HttpTransport;
use crate::TokenEndpoint;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum LoginError {
    #[snafu(display("LoginError: Provider metadata is unavailable"))]
    Discovery { source: DiscoveryError },

    #[snafu(display("LoginError: Callback state does not match the one of this login attempt"))]
    StateMismatch,

    #[snafu(display("LoginError: Invalid callback: {reason}"))]
    InvalidCallback { reason: String },

    #[snafu(display("LoginError: Provider rejected the authorization request: {error_response}"))]
    Authorization { error_response: ErrorResponse },

    #[snafu(display("LoginError: Token request failed"))]
    TokenExchange { source: RequestError },

    #[snafu(display("LoginError: ID token was rejected"))]
    Validation { source: TokenValidationError },

    #[snafu(display("LoginError: Browser was closed by the user"))]
    BrowserCancelled,

    #[snafu(display("LoginError: Browser did not complete in time"))]
    BrowserTimeout,

    #[snafu(display("LoginError: Browser failed: {error:?}"))]
    Browser { error: Option<String> },

    #[snafu(display("LoginError: Cancelled"))]
    Cancelled,
}

impl LoginError {
    /// Whether this is the user (or the caller) deciding not to continue, not an application error.
    pub fn is_user_cancellation(&self) -> bool {
        matches!(
            self,
            LoginError::BrowserCancelled | LoginError::BrowserTimeout | LoginError::Cancelled
        )
    }

    /// The `error`/`error_description` sent by the provider, if the provider sent one.
    pub fn error_response(&self) -> Option<&ErrorResponse> {
        match self {
            LoginError::Authorization { error_response } => Some(error_response),
            LoginError::TokenExchange { source } => source.error_response(),
            _ => None,
        }
    }

    pub fn validation_error(&self) -> Option<&TokenValidationError> {
        match self {
            LoginError::Validation { source } => Some(source),
            _ => None,
        }
    }
}

/// A completed login or refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginSuccess {
    pub tokens: TokenData,
    pub claims: IdTokenClaims,
}

impl LoginSuccess {
    pub fn id_token(&self) -> &str {
        &self.tokens.id_token
    }

    pub fn access_token(&self) -> &str {
        &self.tokens.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.tokens.refresh_token.as_deref()
    }

    pub fn access_token_expires_at(&self) -> Option<OffsetDateTime> {
        self.tokens.access_token_expires_at
    }
}

pub type LoginResult = Result<LoginSuccess, LoginError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    AwaitingCallback,
    Exchanging,
    Validating,
    Succeeded,
    Failed,
    Cancelled,
}

fn transition(from: FlowState, to: FlowState) {
    tracing::debug!(?from, ?to, "Login flow transition");
}

fn fail(from: FlowState, err: LoginError) -> LoginError {
    let to = match err.is_user_cancellation() {
        true => FlowState::Cancelled,
        false => FlowState::Failed,
    };
    tracing::debug!(?from, ?to, %err, "Login flow transition");
    err
}

/// Everything generated for one login attempt. Created by
/// [`OidcClient::prepare_login`](crate::OidcClient::prepare_login) and consumed when the callback
/// is processed.
#[derive(Debug)]
pub struct AuthorizationState {
    pub(crate) nonce: Nonce,
    pub(crate) state: CsrfToken,
    pub(crate) code_verifier: CodeVerifier<128>,
    pub(crate) code_challenge: CodeChallenge,
    pub(crate) redirect_uri: String,
    pub(crate) start_url: Url,
}

impl AuthorizationState {
    pub(crate) fn generate(
        redirect_uri: String,
        build_start_url: impl FnOnce(&CodeChallenge, &Nonce, &CsrfToken) -> Url,
    ) -> Self {
        let nonce = Nonce::new();
        let state = CsrfToken::new();
        let code_verifier = CodeVerifier::<128>::generate();
        let code_challenge = code_verifier.to_code_challenge();
        let start_url = build_start_url(&code_challenge, &nonce, &state);
        Self {
            nonce,
            state,
            code_verifier,
            code_challenge,
            redirect_uri,
            start_url,
        }
    }

    /// The authorize URL to open in a browser.
    pub fn start_url(&self) -> &Url {
        &self.start_url
    }

    pub fn state(&self) -> &str {
        self.state.as_str()
    }

    pub fn nonce(&self) -> &str {
        self.nonce.as_str()
    }

    pub fn code_challenge(&self) -> &CodeChallenge {
        &self.code_challenge
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }
}

#[derive(Debug)]
pub(crate) struct AwaitingCallback {
    authorization: AuthorizationState,
}

impl AwaitingCallback {
    pub(crate) fn new(authorization: AuthorizationState) -> Self {
        transition(FlowState::Idle, FlowState::AwaitingCallback);
        Self { authorization }
    }

    pub(crate) fn authorization(&self) -> &AuthorizationState {
        &self.authorization
    }

    /// Continue with what the browser reported.
    pub(crate) fn browser_completed(self, result: BrowserResult) -> Result<Exchanging, LoginError> {
        let from = FlowState::AwaitingCallback;
        match result.result_type {
            BrowserResultType::Success => match result.response {
                Some(callback) => self.receive(&callback),
                None => Err(fail(
                    from,
                    InvalidCallbackSnafu {
                        reason: "browser reported success without a callback",
                    }
                    .build(),
                )),
            },
            BrowserResultType::Cancelled | BrowserResultType::UserCancel => {
                Err(fail(from, LoginError::BrowserCancelled))
            }
            BrowserResultType::Timeout => Err(fail(from, LoginError::BrowserTimeout)),
            BrowserResultType::UnknownError => Err(fail(
                from,
                LoginError::Browser {
                    error: result.error,
                },
            )),
        }
    }

    /// Check the callback against this attempt and extract the authorization code.
    ///
    /// The state is checked before anything else in the callback is looked at, including an
    /// `error` parameter.
    pub(crate) fn receive(self, callback: &str) -> Result<Exchanging, LoginError> {
        let from = FlowState::AwaitingCallback;
        let callback_url = Url::parse(callback).map_err(|err| {
            fail(
                from,
                InvalidCallbackSnafu {
                    reason: format!("callback is not a URL: {err}"),
                }
                .build(),
            )
        })?;
        if !is_redirect_to(&callback_url, &self.authorization.redirect_uri) {
            return Err(fail(
                from,
                InvalidCallbackSnafu {
                    reason: "callback does not target the redirect URI",
                }
                .build(),
            ));
        }

        let response = CallbackResponse::from_url(&callback_url);
        if !self.authorization.state.matches(response.state()) {
            tracing::warn!("Received callback with unexpected state. Possible CSRF attempt.");
            return Err(fail(from, LoginError::StateMismatch));
        }

        let code = match response {
            CallbackResponse::Error { error_response, .. } => {
                return Err(fail(from, LoginError::Authorization { error_response }));
            }
            CallbackResponse::Code { code: None, .. } => {
                return Err(fail(
                    from,
                    InvalidCallbackSnafu {
                        reason: "callback carries no authorization code",
                    }
                    .build(),
                ));
            }
            CallbackResponse::Code {
                code: Some(code), ..
            } => code,
        };

        transition(from, FlowState::Exchanging);
        Ok(Exchanging {
            authorization: self.authorization,
            code,
        })
    }
}

/// Scheme, host, port and path must be equal. Query and fragment are not compared.
fn is_redirect_to(callback: &Url, redirect_uri: &str) -> bool {
    Url::parse(redirect_uri).is_ok_and(|redirect_uri| {
        callback.scheme() == redirect_uri.scheme()
            && callback.host_str() == redirect_uri.host_str()
            && callback.port_or_known_default() == redirect_uri.port_or_known_default()
            && callback.path() == redirect_uri.path()
    })
}

#[derive(Debug)]
pub(crate) struct Exchanging {
    authorization: AuthorizationState,
    code: String,
}

impl Exchanging {
    pub(crate) async fn exchange(
        self,
        transport: &dyn HttpTransport,
        token_endpoint: TokenEndpoint,
        client_authentication: ClientAuthentication<'_>,
        extra: &ExtraParameters,
    ) -> Result<Validating, LoginError> {
        let response = request::exchange_code_for_token(
            transport,
            token_endpoint,
            client_authentication,
            &self.authorization.redirect_uri,
            &self.code,
            self.authorization.code_verifier.code_verifier(),
            extra,
        )
        .await
        .context(TokenExchangeSnafu {})
        .map_err(|err| fail(FlowState::Exchanging, err))?;

        transition(FlowState::Exchanging, FlowState::Validating);
        Ok(Validating {
            nonce: Some(self.authorization.nonce),
            response,
        })
    }
}

#[derive(Debug)]
pub(crate) struct Validating {
    nonce: Option<Nonce>,
    response: SuccessTokenResponse,
}

impl Validating {
    /// Tokens obtained through a refresh grant. There is no nonce to check them against.
    pub(crate) fn refreshed(response: SuccessTokenResponse) -> Self {
        transition(FlowState::Exchanging, FlowState::Validating);
        Self {
            nonce: None,
            response,
        }
    }

    pub(crate) fn validate(
        self,
        requirements: &IdTokenRequirements,
        keys: &FilteredKeySet,
        now: OffsetDateTime,
    ) -> LoginResult {
        let from = FlowState::Validating;
        let Some(id_token) = self.response.id_token.clone() else {
            return Err(fail(
                from,
                LoginError::Validation {
                    source: TokenValidationError::MalformedToken {
                        reason: "token response contained no id_token".to_owned(),
                    },
                },
            ));
        };

        let claims = token_validation::validate(
            requirements,
            keys,
            &id_token,
            self.nonce.as_ref().map(Nonce::as_str),
            now,
        )
        .context(ValidationSnafu {})
        .map_err(|err| fail(from, err))?;

        transition(from, FlowState::Succeeded);
        Ok(LoginSuccess {
            tokens: TokenData::new(self.response, id_token, now),
            claims,
        })
    }
}
