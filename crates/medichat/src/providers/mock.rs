use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;

use super::base::{GenerateRequest, Provider, ReplyStream, Usage};
use crate::errors::{ProviderError, ProviderResult};

/// One scripted turn of the mock provider.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Stream these fragments, then end cleanly.
    Reply(Vec<String>),
    /// Stream the fragments, then fail mid-reply with the given message.
    FailAfter(Vec<String>, String),
    /// Fail before any stream is opened, as a rejected upstream call does.
    Refuse(String),
}

/// A provider that plays back a script instead of calling anyone.
///
/// Each `complete`/`complete_stream` call consumes the next scripted reply;
/// an exhausted script streams nothing. Calls and the requests they carried
/// are recorded so tests can assert what reached the provider, and that
/// nothing did.
#[derive(Clone, Default)]
pub struct MockProvider {
    script: Arc<Mutex<VecDeque<MockReply>>>,
    requests: Arc<Mutex<Vec<GenerateRequest>>>,
    calls: Arc<AtomicUsize>,
}

impl MockProvider {
    pub fn new(script: Vec<MockReply>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            requests: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A provider scripted with a single fragmented reply.
    pub fn replying(fragments: &[&str]) -> Self {
        Self::new(vec![MockReply::Reply(
            fragments.iter().map(|s| s.to_string()).collect(),
        )])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_reply(&self, request: &GenerateRequest) -> MockReply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(MockReply::Reply(Vec::new()))
    }

    fn refusal(message: String) -> ProviderError {
        ProviderError::Api {
            status: 503,
            message,
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(&self, request: &GenerateRequest) -> ProviderResult<(String, Usage)> {
        match self.next_reply(request) {
            MockReply::Reply(fragments) => Ok((fragments.concat(), Usage::default())),
            MockReply::FailAfter(_, message) | MockReply::Refuse(message) => {
                Err(Self::refusal(message))
            }
        }
    }

    async fn complete_stream(&self, request: &GenerateRequest) -> ProviderResult<ReplyStream> {
        let items: Vec<Result<String, ProviderError>> = match self.next_reply(request) {
            MockReply::Reply(fragments) => fragments.into_iter().map(Ok).collect(),
            MockReply::FailAfter(fragments, message) => fragments
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(Self::refusal(message))))
                .collect(),
            MockReply::Refuse(message) => return Err(Self::refusal(message)),
        };
        Ok(futures::stream::iter(items).boxed())
    }
}
