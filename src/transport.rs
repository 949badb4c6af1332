use std::fmt::Debug;

use async_trait::async_trait;

/// Executes the backchannel HTTP requests of this library: discovery, JWK set, token, refresh and
/// userinfo requests.
///
/// Implemented for [`reqwest::Client`], which is what you want in production. Provide your own
/// implementation to route requests through a proxy layer, add instrumentation, or to test
/// without a network.
#[async_trait]
pub trait HttpTransport: Debug + Send + Sync {
    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, reqwest::Error>;
}

#[async_trait]
impl HttpTransport for reqwest::Client {
    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, reqwest::Error> {
        reqwest::Client::execute(self, request).await
    }
}
