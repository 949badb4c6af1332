use serde::{Deserialize, Serialize};
use snafu::Snafu;

use crate::discovery::DiscoveryError;
use crate::request::RequestError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum UserInfoError {
    #[snafu(display("UserInfoError: Provider metadata is unavailable"))]
    Discovery { source: DiscoveryError },

    #[snafu(display("UserInfoError: Provider does not advertise a userinfo_endpoint"))]
    NoUserInfoEndpoint,

    #[snafu(display("UserInfoError: Userinfo request failed"))]
    Request { source: RequestError },
}

/// Claims returned by the userinfo endpoint.
///
/// See: <https://openid.net/specs/openid-connect-core-1_0.html#UserInfoResponse>
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UserInfo {
    /// (`sub`) Always present. Must be compared against the `sub` of the ID token before trusting
    /// any other claim.
    pub sub: String,

    #[serde(flatten)]
    pub claims: serde_json::Map<String, serde_json::Value>,
}

impl UserInfo {
    pub fn claim<T: serde::de::DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.claims
            .get(name)
            .cloned()
            .and_then(|it| serde_json::from_value(it).ok())
    }
}
