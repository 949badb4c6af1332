use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use itertools::Itertools;
use snafu::{ResultExt, Snafu, ensure};
use url::Url;

use crate::browser::DisplayMode;
use crate::transport::HttpTransport;
use crate::{DiscoveryEndpoint, EndSessionEndpoint, SiteminderLogoutEndpoint};

#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("ConfigError: client_id must not be empty"))]
    EmptyClientId,

    #[snafu(display("ConfigError: '{host}' is not a valid host for {field}"))]
    InvalidHost {
        field: &'static str,
        host: String,
        source: url::ParseError,
    },

    #[snafu(display("ConfigError: '{host}' for {field} must be a bare host, without scheme or path"))]
    NotABareHost { field: &'static str, host: String },

    #[snafu(display("ConfigError: '{uri}' is not a valid URI for {field}"))]
    InvalidRedirectUri {
        field: &'static str,
        uri: String,
        source: url::ParseError,
    },
}

/// Everything needed to talk to the identity provider. Handed to
/// [`OidcClient::new`](crate::OidcClient::new), which validates it once and owns it afterward.
#[derive(Clone)]
pub struct ClientConfiguration {
    /// Host of the OIDC provider, e.g. `idp.example.com`. No scheme, no path. All provider
    /// URLs are built from it using `https`.
    pub authority: String,

    /// Host of the Siteminder proxy owning the primary browser session, e.g. `sm.example.com`.
    pub siteminder_authority: String,

    /// The client identifier registered at the provider.
    pub client_id: String,

    /// Only for confidential clients. Native applications cannot keep a secret and should leave
    /// this `None`.
    pub client_secret: Option<String>,

    /// Space-delimited scopes. `openid` is always requested, whether listed here or not.
    /// Defaults to `"openid profile email"`.
    pub scope: String,

    /// URI the provider redirects to after login, e.g. `com.example.app://oauth2/code/cb`.
    /// Must be registered as an allowed callback URL for `client_id`.
    pub redirect_uri: String,

    /// URI the user agent ends up at after logout. Defaults to `redirect_uri`.
    pub post_logout_redirect_uri: Option<String>,

    /// Tolerated clock skew when validating the time-based claims of ID tokens.
    /// Defaults to 5 minutes.
    pub leeway: Duration,

    /// Maximum time since the user last actively authenticated. Sent as `max_age` with every
    /// authorization request and enforced on the `auth_time` claim of the ID token.
    pub max_age: Option<Duration>,

    /// Transport for discovery, token, refresh and userinfo requests.
    /// Defaults to a plain `reqwest::Client`.
    pub backchannel_transport: Option<Arc<dyn HttpTransport>>,

    /// Transport for refresh requests only. Falls back to `backchannel_transport`.
    pub refresh_transport: Option<Arc<dyn HttpTransport>>,

    pub advanced: AdvancedOptions,
}

impl ClientConfiguration {
    pub fn new(
        authority: impl Into<String>,
        siteminder_authority: impl Into<String>,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            authority: authority.into(),
            siteminder_authority: siteminder_authority.into(),
            client_id: client_id.into(),
            client_secret: None,
            scope: "openid profile email".to_owned(),
            redirect_uri: redirect_uri.into(),
            post_logout_redirect_uri: None,
            leeway: Duration::from_secs(5 * 60),
            max_age: None,
            backchannel_transport: None,
            refresh_transport: None,
            advanced: AdvancedOptions::default(),
        }
    }
}

impl Debug for ClientConfiguration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfiguration")
            .field("authority", &self.authority)
            .field("siteminder_authority", &self.siteminder_authority)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .field("scope", &self.scope)
            .field("redirect_uri", &self.redirect_uri)
            .field("post_logout_redirect_uri", &self.post_logout_redirect_uri)
            .field("leeway", &self.leeway)
            .field("max_age", &self.max_age)
            .field("backchannel_transport", &self.backchannel_transport)
            .field("refresh_transport", &self.refresh_transport)
            .field("advanced", &self.advanced)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AdvancedOptions {
    /// Maximum time a browser invocation (login or logout) may take.
    /// Defaults to `Duration::from_secs(300)`.
    pub browser_timeout: Duration,

    /// Defaults to `DisplayMode::Visible`.
    pub browser_display_mode: DisplayMode,
}

impl Default for AdvancedOptions {
    fn default() -> Self {
        Self {
            browser_timeout: Duration::from_secs(300),
            browser_display_mode: DisplayMode::Visible,
        }
    }
}

/// Additional parameters for a request, as ordered key/value pairs. Keys are unique: inserting an
/// existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraParameters {
    params: Vec<(String, String)>,
}

impl ExtraParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.params.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.params.push((key, value)),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ExtraParameters {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut params = ExtraParameters::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for ExtraParameters {
    fn from(value: [(K, V); N]) -> Self {
        value.into_iter().collect()
    }
}

/// Prepends `openid` unless it is already requested.
pub(crate) fn normalize_scope(scope: &str) -> String {
    let scopes = scope.split_whitespace().unique().collect::<Vec<_>>();
    match scopes.contains(&"openid") {
        true => scopes.join(" "),
        false => std::iter::once("openid").chain(scopes).join(" "),
    }
}

/// Validated configuration, with every derived URL computed once.
#[derive(Debug)]
pub(crate) struct Options {
    pub(crate) client_id: String,
    pub(crate) client_secret: Option<String>,
    pub(crate) scope: String,
    pub(crate) redirect_uri: String,
    pub(crate) post_logout_redirect_uri: String,
    pub(crate) leeway: Duration,
    pub(crate) max_age: Option<Duration>,
    pub(crate) issuer: String,
    pub(crate) discovery_endpoint: DiscoveryEndpoint,
    pub(crate) end_session_endpoint: EndSessionEndpoint,
    pub(crate) siteminder_logout_endpoint: SiteminderLogoutEndpoint,
    pub(crate) advanced: AdvancedOptions,
}

fn https_url_for_host(field: &'static str, host: &str, path: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(&format!("https://{host}{path}")).context(InvalidHostSnafu {
        field,
        host: host.to_owned(),
    })?;
    ensure!(
        !host.is_empty() && url.host_str().is_some() && !host.contains(['/', '?', '#']),
        NotABareHostSnafu {
            field,
            host: host.to_owned(),
        }
    );
    Ok(url)
}

impl Options {
    pub(crate) fn new(config: &ClientConfiguration) -> Result<Self, ConfigError> {
        ensure!(!config.client_id.trim().is_empty(), EmptyClientIdSnafu {});

        let issuer = https_url_for_host("authority", &config.authority, "")?;
        let discovery_endpoint = https_url_for_host(
            "authority",
            &config.authority,
            "/.well-known/openid-configuration",
        )?;
        let end_session_endpoint =
            https_url_for_host("authority", &config.authority, "/idp/startSLO.ping")?;
        let siteminder_logout_endpoint = https_url_for_host(
            "siteminder_authority",
            &config.siteminder_authority,
            "/login/SMLogout.jsp",
        )?;

        Url::parse(&config.redirect_uri).context(InvalidRedirectUriSnafu {
            field: "redirect_uri",
            uri: config.redirect_uri.clone(),
        })?;
        let post_logout_redirect_uri = config
            .post_logout_redirect_uri
            .clone()
            .unwrap_or_else(|| config.redirect_uri.clone());
        Url::parse(&post_logout_redirect_uri).context(InvalidRedirectUriSnafu {
            field: "post_logout_redirect_uri",
            uri: post_logout_redirect_uri.clone(),
        })?;

        Ok(Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scope: normalize_scope(&config.scope),
            redirect_uri: config.redirect_uri.clone(),
            post_logout_redirect_uri,
            leeway: config.leeway,
            max_age: config.max_age,
            // Without the trailing slash `Url` adds for an empty path.
            issuer: issuer.as_str().trim_end_matches('/').to_owned(),
            discovery_endpoint,
            end_session_endpoint,
            siteminder_logout_endpoint,
            advanced: config.advanced.clone(),
        })
    }
}
