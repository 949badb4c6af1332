//! Delivery of deep-link callbacks to waiting browser invocations.
//!
//! On mobile platforms the provider's final redirect leaves the browser and re-enters the
//! application through a registered URI scheme. The host receives that URI out-of-band (an
//! activity intent, an app-delegate call, ...) and forwards it to [`CallbackMediator::send`].
//! [`DeepLinkBrowser`] is the waiting side.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::oneshot;
use url::Url;

use crate::browser::{
    BrowserLauncher, BrowserOptions, BrowserResult, BrowserResultType, CancellationSignal,
};

#[derive(Debug)]
enum Delivery {
    Callback(String),
    Cancelled,
}

#[derive(Debug)]
struct Pending {
    end_url: String,
    state: Option<String>,
    sender: oneshot::Sender<Delivery>,
}

#[derive(Debug, Default)]
struct Registry {
    next_id: u64,
    // Ordered by registration, so the oldest matching entry is found first.
    pending: BTreeMap<u64, Pending>,
}

/// Registry of browser invocations waiting for their callback.
///
/// Cheap to clone. All clones share the same registry. The host keeps one instance, hands a
/// clone to its [`DeepLinkBrowser`] and feeds incoming deep links into [`send`](Self::send).
#[derive(Debug, Clone, Default)]
pub struct CallbackMediator {
    registry: Arc<Mutex<Registry>>,
}

impl CallbackMediator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        // The registry is only ever mutated through complete map operations.
        // A panic elsewhere cannot leave it half-updated.
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register interest in a callback starting with `end_url`. When `state` is known, callbacks
    /// carrying that exact `state` query parameter are routed to this registration first.
    pub fn register(&self, end_url: impl Into<String>, state: Option<String>) -> PendingCallback {
        let (sender, receiver) = oneshot::channel();
        let mut registry = self.lock();
        let id = registry.next_id;
        registry.next_id = registry.next_id.wrapping_add(1);
        registry.pending.insert(
            id,
            Pending {
                end_url: end_url.into(),
                state,
                sender,
            },
        );
        tracing::trace!(id, "Registered pending callback");

        PendingCallback {
            id,
            receiver,
            mediator: self.clone(),
        }
    }

    /// Deliver a callback URL received by the host application.
    ///
    /// Returns `false` when no registration was waiting for it.
    pub fn send(&self, callback_url: impl Into<String>) -> bool {
        let callback_url = callback_url.into();
        let state = Url::parse(&callback_url).ok().and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == "state")
                .map(|(_, value)| value.into_owned())
        });

        let mut registry = self.lock();
        let by_state = state.as_deref().and_then(|state| {
            registry
                .pending
                .iter()
                .find(|(_, pending)| pending.state.as_deref() == Some(state))
                .map(|(id, _)| *id)
        });
        let target = by_state.or_else(|| {
            registry
                .pending
                .iter()
                .find(|(_, pending)| callback_url.starts_with(&pending.end_url))
                .map(|(id, _)| *id)
        });

        let Some(pending) = target.and_then(|id| registry.pending.remove(&id)) else {
            tracing::debug!("Received a callback nobody waits for. Ignoring it.");
            return false;
        };
        drop(registry);

        // The receiver may have gone away in the meantime (timeout, cancellation).
        pending
            .sender
            .send(Delivery::Callback(callback_url))
            .is_ok()
    }

    /// Abandon every pending invocation, e.g. because the application was resumed without a
    /// callback having been delivered. Waiting invocations complete as cancelled by the user.
    pub fn cancel(&self) {
        let pending = std::mem::take(&mut self.lock().pending);
        if !pending.is_empty() {
            tracing::debug!(count = pending.len(), "Cancelling pending callbacks");
        }
        for (_, pending) in pending {
            let _ = pending.sender.send(Delivery::Cancelled);
        }
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    fn deregister(&self, id: u64) {
        self.lock().pending.remove(&id);
    }
}

/// A registration created by [`CallbackMediator::register`]. Dropping it deregisters it.
#[derive(Debug)]
pub struct PendingCallback {
    id: u64,
    receiver: oneshot::Receiver<Delivery>,
    mediator: CallbackMediator,
}

impl PendingCallback {
    /// Wait for the callback. `None` means the registration was cancelled.
    pub async fn wait(mut self) -> Option<String> {
        match (&mut self.receiver).await {
            Ok(Delivery::Callback(url)) => Some(url),
            Ok(Delivery::Cancelled) | Err(_) => None,
        }
    }
}

impl Drop for PendingCallback {
    fn drop(&mut self) {
        self.mediator.deregister(self.id);
    }
}

/// Hands a URL to whatever displays it: the system browser, a custom tab, an authentication
/// session. Returns once the URL was handed over, not once the user is done.
#[async_trait]
pub trait UrlOpener: Debug + Send + Sync {
    async fn open(&self, url: &url::Url) -> Result<(), String>;
}

/// A [`BrowserLauncher`] that opens the start URL through a [`UrlOpener`] and then waits for the
/// host application to deliver the callback through a [`CallbackMediator`].
#[derive(Debug, Clone)]
pub struct DeepLinkBrowser<O> {
    opener: O,
    mediator: CallbackMediator,
}

impl<O: UrlOpener> DeepLinkBrowser<O> {
    pub fn new(opener: O, mediator: CallbackMediator) -> Self {
        Self { opener, mediator }
    }

    pub fn mediator(&self) -> &CallbackMediator {
        &self.mediator
    }
}

#[async_trait]
impl<O: UrlOpener> BrowserLauncher for DeepLinkBrowser<O> {
    async fn invoke(
        &self,
        options: &BrowserOptions,
        cancellation: CancellationSignal,
    ) -> BrowserResult {
        let state = options
            .start_url
            .query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned());

        // Register before opening, so that a very fast redirect cannot be missed.
        let pending = self.mediator.register(options.end_url.clone(), state);

        if let Err(err) = self.opener.open(&options.start_url).await {
            tracing::warn!(%err, "Could not open browser");
            return BrowserResult::unknown_error(err);
        }

        tokio::select! {
            callback = pending.wait() => match callback {
                Some(url) => BrowserResult::success(url),
                None => BrowserResult::of(BrowserResultType::UserCancel),
            },
            () = tokio::time::sleep(options.timeout) => BrowserResult::of(BrowserResultType::Timeout),
            () = cancellation.cancelled() => BrowserResult::of(BrowserResultType::Cancelled),
        }
    }
}
