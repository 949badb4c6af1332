use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use url::Url;

/// How the browser should present itself while the user interacts with the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayMode {
    /// The browser is shown to the user.
    #[default]
    Visible,

    /// The browser attempts to complete without showing any UI, e.g. when an existing session is
    /// expected to let the provider redirect back immediately.
    Hidden,
}

/// Everything a [`BrowserLauncher`] needs to know about one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserOptions {
    /// URL to open.
    pub start_url: Url,

    /// Prefix of the URL the provider redirects to when the interaction is done. Any navigation
    /// to a URL starting with this prefix completes the invocation.
    pub end_url: String,

    /// Maximum time to wait for the interaction to complete.
    pub timeout: Duration,

    pub display_mode: DisplayMode,
}

/// Classification of how a browser invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserResultType {
    /// A navigation to `end_url` was observed. [`BrowserResult::response`] holds its full URL.
    Success,

    /// The invocation was cancelled through its [`CancellationSignal`].
    Cancelled,

    /// `timeout` elapsed before the interaction completed.
    Timeout,

    /// The user closed or dismissed the browser.
    UserCancel,

    /// Anything else. [`BrowserResult::error`] should describe what happened.
    UnknownError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserResult {
    pub result_type: BrowserResultType,

    /// The callback URL (or raw callback data) delivered on success.
    pub response: Option<String>,

    pub error: Option<String>,
}

impl BrowserResult {
    pub fn success(response: impl Into<String>) -> Self {
        Self {
            result_type: BrowserResultType::Success,
            response: Some(response.into()),
            error: None,
        }
    }

    pub fn of(result_type: BrowserResultType) -> Self {
        Self {
            result_type,
            response: None,
            error: None,
        }
    }

    pub fn unknown_error(error: impl Into<String>) -> Self {
        Self {
            result_type: BrowserResultType::UnknownError,
            response: None,
            error: Some(error.into()),
        }
    }
}

/// The system browser, as seen by this library.
///
/// Implementations open `options.start_url`, wait until the provider redirects to a URL starting
/// with `options.end_url` and report that URL back. They own timeout and cancellation handling:
/// the returned [`BrowserResult`] must classify how the interaction ended.
///
/// The host application picks the implementation for its platform and hands it to
/// [`OidcClient::new`](crate::OidcClient::new). [`DeepLinkBrowser`](crate::DeepLinkBrowser)
/// covers the common case of a browser that returns through a registered URI scheme.
#[async_trait]
pub trait BrowserLauncher: Debug + Send + Sync {
    async fn invoke(
        &self,
        options: &BrowserOptions,
        cancellation: CancellationSignal,
    ) -> BrowserResult;
}

/// Owning side of a cancellation. Cancelling is permanent.
#[derive(Debug)]
pub struct CancellationSource {
    sender: watch::Sender<bool>,
}

impl CancellationSource {
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(false);
        Self { sender }
    }

    pub fn signal(&self) -> CancellationSignal {
        CancellationSignal {
            receiver: Some(self.sender.subscribe()),
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Observing side of a cancellation. Cheap to clone.
///
/// `CancellationSignal::default()` never fires.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    receiver: Option<watch::Receiver<bool>>,
}

impl CancellationSignal {
    pub fn is_cancelled(&self) -> bool {
        self.receiver
            .as_ref()
            .is_some_and(|receiver| *receiver.borrow())
    }

    /// Resolves once cancellation was requested. Never resolves for a signal without source, or
    /// when the source was dropped without cancelling.
    pub async fn cancelled(&self) {
        let Some(receiver) = &self.receiver else {
            return std::future::pending().await;
        };
        let mut receiver = receiver.clone();
        let source_alive = receiver.wait_for(|cancelled| *cancelled).await.is_ok();
        if !source_alive {
            std::future::pending::<()>().await;
        }
    }
}
