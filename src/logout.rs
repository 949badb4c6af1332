use url::Url;

use crate::browser::{BrowserResult, BrowserResultType};
use crate::config::ExtraParameters;
use crate::{EndSessionEndpoint, SiteminderLogoutEndpoint};

/// How a logout ended, as classified by the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutOutcome {
    /// The user agent arrived at the post-logout redirect URI.
    Completed,

    /// Cancelled by the caller or dismissed by the user.
    Cancelled,

    TimedOut,

    Failed { error: Option<String> },
}

impl LogoutOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, LogoutOutcome::Completed)
    }
}

impl From<BrowserResult> for LogoutOutcome {
    fn from(result: BrowserResult) -> Self {
        match result.result_type {
            BrowserResultType::Success => LogoutOutcome::Completed,
            BrowserResultType::Cancelled | BrowserResultType::UserCancel => LogoutOutcome::Cancelled,
            BrowserResultType::Timeout => LogoutOutcome::TimedOut,
            BrowserResultType::UnknownError => LogoutOutcome::Failed {
                error: result.error,
            },
        }
    }
}

const RESERVED_PARAMETERS: [&str; 2] = ["client_id", "redirectTo"];

/// The URL to open for a full logout.
///
/// The Siteminder logout page is visited first and clears the proxy session. It then forwards the
/// user agent to its `originalTarget`, the provider's single-logout endpoint, which in turn
/// redirects to `post_logout_redirect_uri`.
pub(crate) fn create_logout_url(
    end_session_endpoint: EndSessionEndpoint,
    siteminder_logout_endpoint: SiteminderLogoutEndpoint,
    client_id: &str,
    post_logout_redirect_uri: &str,
    extra: &ExtraParameters,
) -> Url {
    let mut provider_logout_url: Url = end_session_endpoint;
    {
        let mut query = provider_logout_url.query_pairs_mut();
        query.append_pair("client_id", client_id);
        for (key, value) in extra.iter() {
            if RESERVED_PARAMETERS.contains(&key) {
                tracing::warn!(key, "Ignoring extra parameter overriding a logout parameter");
                continue;
            }
            query.append_pair(key, value);
        }
        query.append_pair("redirectTo", post_logout_redirect_uri);
    }

    let mut logout_url: Url = siteminder_logout_endpoint;
    logout_url
        .query_pairs_mut()
        .append_pair("originalTarget", provider_logout_url.as_str());
    logout_url
}
