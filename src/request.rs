use base64::{Engine, engine::general_purpose::STANDARD};
use http::{HeaderValue, Method, header};
use serde::de::DeserializeOwned;
use snafu::{ResultExt, Snafu};
use url::{Url, form_urlencoded};

use crate::{
    config::ExtraParameters,
    discovery::{DiscoveryDocument, RawJwkSet},
    response::{ErrorResponse, SuccessTokenResponse, TokenResponse},
    transport::HttpTransport,
};

#[derive(Debug, Snafu)]
pub enum RequestError {
    #[snafu(display("RequestError: Could not send request"))]
    Send { source: reqwest::Error },

    #[snafu(display("RequestError: Could not decode payload"))]
    Decode { source: reqwest::Error },

    #[snafu(display("RequestError: Received an error response: {error_response}"))]
    ErrResponse { error_response: ErrorResponse },

    #[snafu(display("RequestError: Received unexpected status {status}"))]
    Status { status: http::StatusCode },

    #[snafu(display("RequestError: Access token cannot be sent in a header"))]
    InvalidAccessToken {
        source: http::header::InvalidHeaderValue,
    },
}

impl RequestError {
    /// The provider's error response, if this error carries one.
    pub fn error_response(&self) -> Option<&ErrorResponse> {
        match self {
            RequestError::ErrResponse { error_response } => Some(error_response),
            _ => None,
        }
    }
}

/// How this client authenticates itself at the token endpoint.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ClientAuthentication<'a> {
    /// Public client. Only `client_id` is sent.
    None { client_id: &'a str },

    /// `client_secret_basic`: credentials in the `Authorization` header.
    Basic {
        client_id: &'a str,
        client_secret: &'a str,
    },

    /// `client_secret_post`: credentials in the form body.
    Post {
        client_id: &'a str,
        client_secret: &'a str,
    },
}

impl ClientAuthentication<'_> {
    /// Adds the client's form parameters. Returns the `Authorization` header value to send, if
    /// any.
    fn apply(&self, form: &mut Vec<(&str, String)>) -> Option<HeaderValue> {
        match *self {
            ClientAuthentication::None { client_id } => {
                form.push(("client_id", client_id.to_owned()));
                None
            }
            ClientAuthentication::Basic {
                client_id,
                client_secret,
            } => {
                // RFC 6749 Section 2.3.1: both parts are form-urlencoded before being joined.
                let encode =
                    |it: &str| form_urlencoded::byte_serialize(it.as_bytes()).collect::<String>();
                let credentials = format!("{}:{}", encode(client_id), encode(client_secret));
                form.push(("client_id", client_id.to_owned()));
                HeaderValue::from_str(&format!("Basic {}", STANDARD.encode(credentials))).ok()
            }
            ClientAuthentication::Post {
                client_id,
                client_secret,
            } => {
                form.push(("client_id", client_id.to_owned()));
                form.push(("client_secret", client_secret.to_owned()));
                None
            }
        }
    }
}

fn get(url: Url) -> reqwest::Request {
    let mut request = reqwest::Request::new(Method::GET, url);
    request
        .headers_mut()
        .insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    request
}

fn post_form(url: Url, form: &[(&str, String)]) -> reqwest::Request {
    let body = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(form.iter().map(|(key, value)| (*key, value.as_str())))
        .finish();
    let mut request = reqwest::Request::new(Method::POST, url);
    request.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/x-www-form-urlencoded"),
    );
    request
        .headers_mut()
        .insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    *request.body_mut() = Some(body.into());
    request
}

async fn get_json<T: DeserializeOwned>(
    transport: &dyn HttpTransport,
    url: Url,
) -> Result<T, RequestError> {
    let response = transport.execute(get(url)).await.context(SendSnafu {})?;
    let status = response.status();
    if !status.is_success() {
        return StatusSnafu { status }.fail();
    }
    response.json::<T>().await.context(DecodeSnafu {})
}

pub(crate) async fn retrieve_oidc_config(
    transport: &dyn HttpTransport,
    discovery_endpoint: Url,
) -> Result<DiscoveryDocument, RequestError> {
    get_json(transport, discovery_endpoint).await
}

/// The keys are returned undecoded. Deciding which of them are usable is up to
/// [`filter_raw_keys`](crate::jwk::filter_raw_keys).
pub(crate) async fn retrieve_jwk_set(
    transport: &dyn HttpTransport,
    jwk_set_endpoint: Url,
) -> Result<Vec<serde_json::Value>, RequestError> {
    let raw_set: RawJwkSet = get_json(transport, jwk_set_endpoint).await?;
    Ok(raw_set.keys)
}

/// Token request parameters set by this library. Extra parameters cannot replace them.
const RESERVED_TOKEN_PARAMETERS: [&str; 7] = [
    "grant_type",
    "code",
    "redirect_uri",
    "code_verifier",
    "refresh_token",
    "client_id",
    "client_secret",
];

fn token_form<'a>(
    mut form: Vec<(&'a str, String)>,
    extra: &'a ExtraParameters,
) -> Vec<(&'a str, String)> {
    for (key, value) in extra.iter() {
        if RESERVED_TOKEN_PARAMETERS.contains(&key) {
            tracing::warn!(key, "Ignoring extra parameter overriding a token request parameter");
            continue;
        }
        form.push((key, value.to_owned()));
    }
    form
}

async fn token_request(
    transport: &dyn HttpTransport,
    token_endpoint: Url,
    client_authentication: ClientAuthentication<'_>,
    form: Vec<(&'static str, String)>,
    extra: &ExtraParameters,
) -> Result<SuccessTokenResponse, RequestError> {
    let mut form: Vec<(&str, String)> = form;
    let authorization = client_authentication.apply(&mut form);
    let form = token_form(form, extra);

    let mut prepared = post_form(token_endpoint, &form);
    if let Some(authorization) = authorization {
        prepared
            .headers_mut()
            .insert(header::AUTHORIZATION, authorization);
    }

    match transport
        .execute(prepared)
        .await
        .context(SendSnafu {})?
        .json::<TokenResponse>()
        .await
        .context(DecodeSnafu {})?
    {
        TokenResponse::Success(success) => Ok(success),
        TokenResponse::Error(error) => Err(ErrResponseSnafu {
            error_response: error,
        }
        .build()),
    }
}

pub(crate) async fn exchange_code_for_token(
    transport: &dyn HttpTransport,
    token_endpoint: Url,
    client_authentication: ClientAuthentication<'_>,
    redirect_uri: &str,
    code: &str,
    code_verifier: &str,
    extra: &ExtraParameters,
) -> Result<SuccessTokenResponse, RequestError> {
    let form = vec![
        ("grant_type", "authorization_code".to_owned()),
        ("code", code.to_owned()),
        ("redirect_uri", redirect_uri.to_owned()),
        ("code_verifier", code_verifier.to_owned()),
    ];
    token_request(transport, token_endpoint, client_authentication, form, extra).await
}

pub(crate) async fn refresh_token(
    transport: &dyn HttpTransport,
    token_endpoint: Url,
    client_authentication: ClientAuthentication<'_>,
    refresh_token: &str,
    extra: &ExtraParameters,
) -> Result<SuccessTokenResponse, RequestError> {
    let form = vec![
        ("grant_type", "refresh_token".to_owned()),
        ("refresh_token", refresh_token.to_owned()),
    ];
    token_request(transport, token_endpoint, client_authentication, form, extra).await
}

pub(crate) async fn retrieve_user_info<T: DeserializeOwned>(
    transport: &dyn HttpTransport,
    user_info_endpoint: Url,
    access_token: &str,
) -> Result<T, RequestError> {
    let authorization = HeaderValue::from_str(&format!("Bearer {access_token}"))
        .context(InvalidAccessTokenSnafu {})?;
    let mut request = get(user_info_endpoint);
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, authorization);

    let response = transport.execute(request).await.context(SendSnafu {})?;
    let status = response.status();
    if status.is_success() {
        return response.json().await.context(DecodeSnafu {});
    }
    match response.json::<ErrorResponse>().await {
        Ok(error_response) => ErrResponseSnafu { error_response }.fail(),
        Err(_) => StatusSnafu { status }.fail(),
    }
}
