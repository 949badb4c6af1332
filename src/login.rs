use std::time::Duration;

use url::Url;

use crate::AuthorizationEndpoint;
use crate::code_verifier::CodeChallenge;
use crate::config::ExtraParameters;
use crate::csrf_token::{CsrfToken, Nonce};
use crate::time_ext::StdDurationExt;

/// Parameters set by this library. Extra parameters cannot replace them.
const RESERVED_PARAMETERS: [&str; 8] = [
    "response_type",
    "client_id",
    "scope",
    "redirect_uri",
    "state",
    "nonce",
    "code_challenge",
    "code_challenge_method",
];

/// The caller's extra parameters, plus `max_age` in whole seconds if one is configured.
pub(crate) fn authorize_parameters(
    extra: &ExtraParameters,
    max_age: Option<Duration>,
) -> ExtraParameters {
    let mut parameters = extra.clone();
    if let Some(max_age) = max_age {
        parameters.insert("max_age", max_age.rounded_seconds().to_string());
    }
    parameters
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn create_login_url(
    authorization_endpoint: AuthorizationEndpoint,
    code_challenge: &CodeChallenge,
    nonce: &Nonce,
    state: &CsrfToken,
    client_id: &str,
    redirect_uri: &str,
    scope: &str,
    extra: &ExtraParameters,
) -> Url {
    let mut login_url: Url = authorization_endpoint;
    {
        let mut query = login_url.query_pairs_mut();
        query
            .append_pair("response_type", "code")
            .append_pair("client_id", client_id)
            .append_pair("scope", scope)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("state", state.as_str())
            .append_pair("nonce", nonce.as_str())
            .append_pair("code_challenge", code_challenge.code_challenge())
            .append_pair(
                "code_challenge_method",
                code_challenge.code_challenge_method().as_str(),
            );
        for (key, value) in extra.iter() {
            if RESERVED_PARAMETERS.contains(&key) {
                tracing::warn!(key, "Ignoring extra parameter overriding a protocol parameter");
                continue;
            }
            query.append_pair(key, value);
        }
    }
    login_url
}
