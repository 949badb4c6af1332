use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::sync::Arc;

use snafu::{OptionExt, ResultExt};
use time::OffsetDateTime;
use url::Url;

use crate::browser::{BrowserLauncher, BrowserOptions, CancellationSignal};
use crate::config::{ClientConfiguration, ConfigError, ExtraParameters, Options};
use crate::discovery::{DiscoveryError, MetadataCache, ProviderMetadata};
use crate::flow::{
    AuthorizationState, AwaitingCallback, DiscoverySnafu, Exchanging, LoginError, LoginResult,
    TokenExchangeSnafu, Validating,
};
use crate::login::{authorize_parameters, create_login_url};
use crate::logout::{LogoutOutcome, create_logout_url};
use crate::request::{self, ClientAuthentication};
use crate::token_validation::IdTokenRequirements;
use crate::transport::HttpTransport;
use crate::user_info::{self, NoUserInfoEndpointSnafu, UserInfo, UserInfoError};

/// OIDC client for a native application authenticating against a provider behind a Siteminder
/// proxy.
///
/// One instance per provider configuration. Provider metadata is resolved on first use and kept
/// for the lifetime of the instance; create a new instance to pick up rotated keys.
///
/// All operations take `&self` and may run concurrently. Each login carries its own state, nonce
/// and PKCE pair.
pub struct OidcClient {
    options: Options,
    requirements: IdTokenRequirements,
    browser: Arc<dyn BrowserLauncher>,
    backchannel_transport: Arc<dyn HttpTransport>,
    refresh_transport: Arc<dyn HttpTransport>,
    metadata: MetadataCache,
}

impl Debug for OidcClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcClient")
            .field("client_id", &self.options.client_id)
            .field("issuer", &self.options.issuer)
            .field("browser", &self.browser)
            .field("metadata_resolved", &self.metadata.get().is_some())
            .finish_non_exhaustive()
    }
}

/// Resolves to `LoginError::Cancelled` as soon as `cancellation` fires.
async fn cancellable<T>(
    cancellation: &CancellationSignal,
    future: impl Future<Output = T>,
) -> Result<T, LoginError> {
    tokio::select! {
        biased;
        () = cancellation.cancelled() => {
            tracing::debug!("Operation cancelled");
            Err(LoginError::Cancelled)
        }
        output = future => Ok(output),
    }
}

impl OidcClient {
    pub fn new(
        config: ClientConfiguration,
        browser: Arc<dyn BrowserLauncher>,
    ) -> Result<Self, ConfigError> {
        let options = Options::new(&config)?;
        let backchannel_transport = config
            .backchannel_transport
            .unwrap_or_else(|| Arc::new(reqwest::Client::new()) as Arc<dyn HttpTransport>);
        let refresh_transport = config
            .refresh_transport
            .unwrap_or_else(|| Arc::clone(&backchannel_transport));
        let requirements = IdTokenRequirements {
            issuer: options.issuer.clone(),
            audience: options.client_id.clone(),
            leeway: options.leeway,
            max_age: options.max_age,
        };
        tracing::debug!(client_id = %options.client_id, issuer = %options.issuer, "Created OIDC client");

        Ok(Self {
            options,
            requirements,
            browser,
            backchannel_transport,
            refresh_transport,
            metadata: MetadataCache::default(),
        })
    }

    pub fn id_token_requirements(&self) -> &IdTokenRequirements {
        &self.requirements
    }

    /// The normalized scope sent with every authorization request.
    pub fn scope(&self) -> &str {
        &self.options.scope
    }

    /// Provider metadata, resolved through discovery on first call.
    pub async fn provider_metadata(&self) -> Result<Arc<ProviderMetadata>, DiscoveryError> {
        self.metadata
            .get_or_resolve(
                self.backchannel_transport.as_ref(),
                &self.options.discovery_endpoint,
                &self.options.siteminder_logout_endpoint,
            )
            .await
    }

    fn client_authentication<'a>(&'a self, metadata: &ProviderMetadata) -> ClientAuthentication<'a> {
        let client_id = self.options.client_id.as_str();
        match self.options.client_secret.as_deref() {
            None => ClientAuthentication::None { client_id },
            Some(client_secret) if metadata.supports_auth_method("client_secret_basic") => {
                ClientAuthentication::Basic {
                    client_id,
                    client_secret,
                }
            }
            Some(client_secret) => ClientAuthentication::Post {
                client_id,
                client_secret,
            },
        }
    }

    /// Generate the state of a new login attempt, including the authorize URL to open.
    ///
    /// For hosts driving the browser themselves. Hand the callback and the returned state to
    /// [`process_response`](Self::process_response) afterward.
    pub async fn prepare_login(
        &self,
        extra: &ExtraParameters,
    ) -> Result<AuthorizationState, LoginError> {
        let metadata = self.provider_metadata().await.context(DiscoverySnafu {})?;
        let parameters = authorize_parameters(extra, self.options.max_age);
        Ok(AuthorizationState::generate(
            self.options.redirect_uri.clone(),
            |code_challenge, nonce, state| {
                create_login_url(
                    metadata.authorization_endpoint.clone(),
                    code_challenge,
                    nonce,
                    state,
                    &self.options.client_id,
                    &self.options.redirect_uri,
                    &self.options.scope,
                    &parameters,
                )
            },
        ))
    }

    /// Run a complete interactive login: open the browser, wait for the callback, exchange the
    /// code and validate the ID token.
    pub async fn login(
        &self,
        extra: &ExtraParameters,
        cancellation: CancellationSignal,
    ) -> LoginResult {
        let authorization = self.prepare_login(extra).await?;
        let flow = AwaitingCallback::new(authorization);

        let browser_options = BrowserOptions {
            start_url: flow.authorization().start_url().clone(),
            end_url: self.options.redirect_uri.clone(),
            timeout: self.options.advanced.browser_timeout,
            display_mode: self.options.advanced.browser_display_mode,
        };
        let browser_result = self
            .browser
            .invoke(&browser_options, cancellation.clone())
            .await;

        // `extra` belongs to the authorization request. The code exchange gets none.
        let exchanging = flow.browser_completed(browser_result)?;
        cancellable(
            &cancellation,
            self.complete(exchanging, &ExtraParameters::new()),
        )
        .await?
    }

    /// Continue a login started with [`prepare_login`](Self::prepare_login) with the callback URL
    /// the provider redirected to.
    pub async fn process_response(
        &self,
        callback: &str,
        authorization: AuthorizationState,
        extra: &ExtraParameters,
    ) -> LoginResult {
        let exchanging = AwaitingCallback::new(authorization).receive(callback)?;
        self.complete(exchanging, extra).await
    }

    async fn complete(
        &self,
        exchanging: Exchanging,
        extra: &ExtraParameters,
    ) -> LoginResult {
        let metadata = self.provider_metadata().await.context(DiscoverySnafu {})?;
        let validating = exchanging
            .exchange(
                self.backchannel_transport.as_ref(),
                metadata.token_endpoint.clone(),
                self.client_authentication(&metadata),
                extra,
            )
            .await?;
        validating.validate(
            &self.requirements,
            &metadata.signing_keys,
            OffsetDateTime::now_utc(),
        )
    }

    /// Obtain new tokens with a refresh token. The new ID token is validated like the one of a
    /// login, except for the nonce.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
        extra: &ExtraParameters,
        cancellation: CancellationSignal,
    ) -> LoginResult {
        let metadata = self.provider_metadata().await.context(DiscoverySnafu {})?;
        tracing::debug!("Refreshing tokens");

        let response = cancellable(
            &cancellation,
            request::refresh_token(
                self.refresh_transport.as_ref(),
                metadata.token_endpoint.clone(),
                self.client_authentication(&metadata),
                refresh_token,
                extra,
            ),
        )
        .await?
        .context(TokenExchangeSnafu {})?;

        Validating::refreshed(response).validate(
            &self.requirements,
            &metadata.signing_keys,
            OffsetDateTime::now_utc(),
        )
    }

    /// The URL [`logout`](Self::logout) opens.
    pub fn logout_url(&self, extra: &ExtraParameters) -> Url {
        create_logout_url(
            self.options.end_session_endpoint.clone(),
            self.options.siteminder_logout_endpoint.clone(),
            &self.options.client_id,
            &self.options.post_logout_redirect_uri,
            extra,
        )
    }

    /// End the Siteminder session and the provider session, in that order.
    ///
    /// Needs no provider metadata. Tokens held by the caller are not touched.
    pub async fn logout(
        &self,
        extra: &ExtraParameters,
        cancellation: CancellationSignal,
    ) -> LogoutOutcome {
        let browser_options = BrowserOptions {
            start_url: self.logout_url(extra),
            end_url: self.options.post_logout_redirect_uri.clone(),
            timeout: self.options.advanced.browser_timeout,
            display_mode: self.options.advanced.browser_display_mode,
        };
        tracing::debug!(logout_url = %browser_options.start_url, "Logging out");

        let outcome = LogoutOutcome::from(self.browser.invoke(&browser_options, cancellation).await);
        tracing::debug!(?outcome, "Logout finished");
        outcome
    }

    /// Claims about the user owning `access_token`, as returned by the provider's userinfo
    /// endpoint.
    pub async fn get_user_info(&self, access_token: &str) -> Result<UserInfo, UserInfoError> {
        let metadata = self
            .provider_metadata()
            .await
            .context(user_info::DiscoverySnafu {})?;
        let endpoint = metadata
            .userinfo_endpoint
            .clone()
            .context(NoUserInfoEndpointSnafu {})?;

        request::retrieve_user_info(self.backchannel_transport.as_ref(), endpoint, access_token)
            .await
            .context(user_info::RequestSnafu {})
    }
}
