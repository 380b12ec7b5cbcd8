//! Scripted transport for tests.

use crate::errors::{PayPalError, Result};
use crate::proxy::Proxy;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct MockState {
    init_uris: Vec<String>,
    sent: Vec<Vec<u8>>,
    replies: VecDeque<Result<Vec<u8>>>,
}

/// A [`Proxy`] that never touches the network.
///
/// Replies are served in the order they were queued. Clones share state, so
/// a test can keep one clone for inspection and hand the other to a client.
///
/// # Examples
///
/// ```
/// use paypal_nvp::proxy::{mock::MockProxy, Proxy};
///
/// let proxy = MockProxy::new().with_reply("ACK=Success");
/// assert_eq!(proxy.send(b"METHOD=Ping").unwrap(), b"ACK=Success");
/// assert_eq!(proxy.sent(), vec![b"METHOD=Ping".to_vec()]);
/// ```
#[derive(Clone, Default)]
pub struct MockProxy {
    state: Arc<Mutex<MockState>>,
}

impl MockProxy {
    /// Creates a mock with no queued replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful reply body.
    pub fn with_reply(self, body: impl Into<Vec<u8>>) -> Self {
        self.push_reply(Ok(body.into()));
        self
    }

    /// Queues a failure.
    pub fn with_error(self, error: PayPalError) -> Self {
        self.push_reply(Err(error));
        self
    }

    /// Queues a reply or failure.
    pub fn push_reply(&self, reply: Result<Vec<u8>>) {
        self.lock().replies.push_back(reply);
    }

    /// Payloads passed to `send`, oldest first.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.lock().sent.clone()
    }

    /// URIs passed to `init`, oldest first.
    pub fn init_uris(&self) -> Vec<String> {
        self.lock().init_uris.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the recorded calls from others.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Proxy for MockProxy {
    fn name(&self) -> &str {
        "mock"
    }

    fn init(&mut self, server_uri: &str) {
        self.lock().init_uris.push(server_uri.to_string());
    }

    fn send(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let mut state = self.lock();
        state.sent.push(payload.to_vec());
        state
            .replies
            .pop_front()
            .unwrap_or_else(|| Err(PayPalError::MalformedResponse("no reply queued".to_string())))
    }

    fn is_supported() -> bool {
        true
    }
}
