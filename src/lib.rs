//! OpenID Connect authorization code flow (with PKCE) for native applications whose identity
//! provider sits behind a Siteminder proxy.
//!
//! The library drives the protocol: provider discovery, authorization request, code exchange,
//! ID token validation, refresh, userinfo and the chained Siteminder/provider logout. Showing the
//! provider's pages is left to a [`BrowserLauncher`] supplied by the host application.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use ping_oidc_client::{
//!     CallbackMediator, CancellationSignal, ClientConfiguration, DeepLinkBrowser,
//!     ExtraParameters, OidcClient, UrlOpener, url::Url,
//! };
//!
//! #[derive(Debug)]
//! struct SystemBrowser;
//!
//! #[async_trait]
//! impl UrlOpener for SystemBrowser {
//!     async fn open(&self, _url: &Url) -> Result<(), String> {
//!         // Hand `_url` to the platform's browser here.
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! // Incoming deep links must be forwarded to `mediator.send(url)` by the host.
//! let mediator = CallbackMediator::new();
//! let browser = DeepLinkBrowser::new(SystemBrowser, mediator.clone());
//!
//! let mut config = ClientConfiguration::new(
//!     "idp.example.com",
//!     "sm.example.com",
//!     "my-app",
//!     "com.example.app://oauth2/code/cb",
//! );
//! config.scope = "profile email offline_access".to_owned();
//!
//! let client = OidcClient::new(config, Arc::new(browser))?;
//!
//! let login = client
//!     .login(&ExtraParameters::new(), CancellationSignal::default())
//!     .await?;
//! println!("Hello, {:?}", login.claims.name);
//!
//! if let Some(refresh_token) = login.refresh_token() {
//!     let refreshed = client
//!         .refresh_token(refresh_token, &ExtraParameters::new(), CancellationSignal::default())
//!         .await?;
//!     println!("New access token expires at {:?}", refreshed.access_token_expires_at());
//! }
//!
//! let outcome = client
//!     .logout(&ExtraParameters::new(), CancellationSignal::default())
//!     .await;
//! println!("Logout: {outcome:?}");
//! # Ok(())
//! # }
//! ```

mod browser;
mod client;
mod code_verifier;
mod config;
mod csrf_token;
mod discovery;
mod flow;
mod jwk;
mod login;
mod logout;
mod mediator;
mod request;
mod response;
mod time_ext;
mod token;
mod token_claims;
mod token_validation;
mod transport;
mod user_info;

// Library exports.
pub use browser::{
    BrowserLauncher, BrowserOptions, BrowserResult, BrowserResultType, CancellationSignal,
    CancellationSource, DisplayMode,
};
pub use client::OidcClient;
pub use code_verifier::{CodeChallenge, CodeChallengeMethod};
pub use config::{AdvancedOptions, ClientConfiguration, ConfigError, ExtraParameters};
pub use discovery::{DiscoveryError, ProviderMetadata};
pub use flow::{AuthorizationState, FlowState, LoginError, LoginResult, LoginSuccess};
pub use jwk::{FilteredKeySet, filter_keys, filter_raw_keys, has_rsa_components};
pub use logout::LogoutOutcome;
pub use mediator::{CallbackMediator, DeepLinkBrowser, PendingCallback, UrlOpener};
pub use request::RequestError;
pub use response::{ErrorResponse, KnownOidcErrorCode, OidcErrorCode};
pub use token::TokenData;
pub use token_claims::{Audiences, IdTokenClaims};
pub use token_validation::{IdTokenRequirements, TokenValidationError, validate};
pub use transport::HttpTransport;
pub use user_info::{UserInfo, UserInfoError};

pub mod url {
    pub use url::Url;
}
pub mod reqwest {
    pub use reqwest::*;
}
pub mod jsonwebtoken {
    pub use jsonwebtoken::*;
}

pub type DiscoveryEndpoint = url::Url;
pub type AuthorizationEndpoint = url::Url;
pub type TokenEndpoint = url::Url;
pub type UserInfoEndpoint = url::Url;
/// The provider's single-logout endpoint, `https://{authority}/idp/startSLO.ping`.
pub type EndSessionEndpoint = url::Url;
/// The Siteminder logout page, `https://{siteminder_authority}/login/SMLogout.jsp`.
pub type SiteminderLogoutEndpoint = url::Url;
