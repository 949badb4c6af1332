use std::sync::Arc;

use serde::Deserialize;
use snafu::{OptionExt, ResultExt, Snafu};
use tokio::sync::OnceCell;
use url::Url;

use crate::jwk::{FilteredKeySet, filter_raw_keys};
use crate::request::{self, RequestError};
use crate::transport::HttpTransport;
use crate::{
    AuthorizationEndpoint, DiscoveryEndpoint, SiteminderLogoutEndpoint, TokenEndpoint,
    UserInfoEndpoint,
};

#[derive(Debug, Snafu)]
pub enum DiscoveryError {
    #[snafu(display("DiscoveryError: Could not retrieve the discovery document"))]
    Request { source: RequestError },

    #[snafu(display("DiscoveryError: Discovery document is missing '{field}'"))]
    MissingField { field: &'static str },

    #[snafu(display("DiscoveryError: '{field}' is not a valid URL: '{value}'"))]
    InvalidEndpoint {
        field: &'static str,
        value: String,
        source: url::ParseError,
    },

    #[snafu(display("DiscoveryError: Could not retrieve the JWK set"))]
    JwkSetRequest { source: RequestError },
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawJwkSet {
    pub(crate) keys: Vec<serde_json::Value>,
}

/// The parts of `/.well-known/openid-configuration` this library reads.
///
/// Every field is optional here. Which of them are required is decided while turning the document
/// into [`ProviderMetadata`], so that a missing one can be reported by name.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DiscoveryDocument {
    pub(crate) issuer: Option<String>,
    pub(crate) authorization_endpoint: Option<String>,
    pub(crate) token_endpoint: Option<String>,
    pub(crate) userinfo_endpoint: Option<String>,
    pub(crate) jwks_uri: Option<String>,
    /// Some providers embed the key set instead of (or in addition to) referencing it.
    pub(crate) jwks: Option<RawJwkSet>,
    #[serde(default)]
    pub(crate) token_endpoint_auth_methods_supported: Vec<String>,
}

/// Provider endpoints and keys, resolved once per client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: AuthorizationEndpoint,
    pub token_endpoint: TokenEndpoint,
    pub userinfo_endpoint: Option<UserInfoEndpoint>,

    /// The Siteminder logout page. Never taken from the discovery document: logging out at the
    /// provider alone would leave the proxy session alive.
    pub end_session_endpoint: SiteminderLogoutEndpoint,

    pub signing_keys: FilteredKeySet,
    pub token_endpoint_auth_methods_supported: Vec<String>,
}

impl ProviderMetadata {
    pub(crate) fn supports_auth_method(&self, method: &str) -> bool {
        self.token_endpoint_auth_methods_supported
            .iter()
            .any(|it| it == method)
    }
}

fn parse_endpoint(field: &'static str, value: &str) -> Result<Url, DiscoveryError> {
    Url::parse(value).context(InvalidEndpointSnafu {
        field,
        value: value.to_owned(),
    })
}

/// Where the signing keys of a validated document come from.
enum KeySource {
    Inline(Vec<serde_json::Value>),
    Remote(Url),
}

struct ValidatedDocument {
    issuer: String,
    authorization_endpoint: AuthorizationEndpoint,
    token_endpoint: TokenEndpoint,
    userinfo_endpoint: Option<UserInfoEndpoint>,
    key_source: KeySource,
    token_endpoint_auth_methods_supported: Vec<String>,
}

impl DiscoveryDocument {
    fn validate(self) -> Result<ValidatedDocument, DiscoveryError> {
        let issuer = self.issuer.context(MissingFieldSnafu { field: "issuer" })?;
        let authorization_endpoint = parse_endpoint(
            "authorization_endpoint",
            &self.authorization_endpoint.context(MissingFieldSnafu {
                field: "authorization_endpoint",
            })?,
        )?;
        let token_endpoint = parse_endpoint(
            "token_endpoint",
            &self.token_endpoint.context(MissingFieldSnafu {
                field: "token_endpoint",
            })?,
        )?;
        let userinfo_endpoint = self
            .userinfo_endpoint
            .as_deref()
            .map(|it| parse_endpoint("userinfo_endpoint", it))
            .transpose()?;
        let key_source = match (self.jwks, self.jwks_uri) {
            (Some(jwks), _) => KeySource::Inline(jwks.keys),
            (None, Some(jwks_uri)) => KeySource::Remote(parse_endpoint("jwks_uri", &jwks_uri)?),
            (None, None) => return MissingFieldSnafu { field: "jwks_uri" }.fail(),
        };

        Ok(ValidatedDocument {
            issuer,
            authorization_endpoint,
            token_endpoint,
            userinfo_endpoint,
            key_source,
            token_endpoint_auth_methods_supported: self.token_endpoint_auth_methods_supported,
        })
    }
}

/// Fetch the discovery document and the signing keys it points to.
pub(crate) async fn resolve(
    transport: &dyn HttpTransport,
    discovery_endpoint: DiscoveryEndpoint,
    end_session_endpoint: SiteminderLogoutEndpoint,
) -> Result<ProviderMetadata, DiscoveryError> {
    tracing::debug!(%discovery_endpoint, "Retrieving OIDC configuration");
    let document = request::retrieve_oidc_config(transport, discovery_endpoint)
        .await
        .context(RequestSnafu {})?
        .validate()?;

    let raw_keys = match document.key_source {
        KeySource::Inline(keys) => keys,
        KeySource::Remote(jwks_uri) => {
            tracing::debug!(%jwks_uri, "Retrieving JWK set");
            request::retrieve_jwk_set(transport, jwks_uri)
                .await
                .context(JwkSetRequestSnafu {})?
        }
    };
    let received = raw_keys.len();
    let signing_keys = filter_raw_keys(raw_keys);
    tracing::debug!(received, usable = signing_keys.len(), "Resolved provider metadata");

    Ok(ProviderMetadata {
        issuer: document.issuer,
        authorization_endpoint: document.authorization_endpoint,
        token_endpoint: document.token_endpoint,
        userinfo_endpoint: document.userinfo_endpoint,
        end_session_endpoint,
        signing_keys,
        token_endpoint_auth_methods_supported: document.token_endpoint_auth_methods_supported,
    })
}

/// Write-once holder of a client's [`ProviderMetadata`].
///
/// Concurrent first callers wait for a single resolution. A failed resolution leaves the cache
/// empty, so the next caller tries again.
#[derive(Debug, Default)]
pub(crate) struct MetadataCache {
    cell: OnceCell<Arc<ProviderMetadata>>,
}

impl MetadataCache {
    pub(crate) async fn get_or_resolve(
        &self,
        transport: &dyn HttpTransport,
        discovery_endpoint: &DiscoveryEndpoint,
        end_session_endpoint: &SiteminderLogoutEndpoint,
    ) -> Result<Arc<ProviderMetadata>, DiscoveryError> {
        self.cell
            .get_or_try_init(|| async {
                resolve(
                    transport,
                    discovery_endpoint.clone(),
                    end_session_endpoint.clone(),
                )
                .await
                .map(Arc::new)
            })
            .await
            .map(Arc::clone)
    }

    pub(crate) fn get(&self) -> Option<Arc<ProviderMetadata>> {
        self.cell.get().cloned()
    }
}
