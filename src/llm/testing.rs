//! Scripted completion client for driver and router tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::llm::completion::{
    CompletionClient, CompletionFuture, CompletionRequest, CompletionResponse,
};
use crate::llm::error::{ExternalCallError, ExternalCallResult};

/// Replays queued responses in order and records every request.
#[derive(Default)]
pub struct ScriptedCompletionClient {
    script: Mutex<VecDeque<ExternalCallResult<CompletionResponse>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    repeat: Option<CompletionResponse>,
    delay: Option<Duration>,
}

impl ScriptedCompletionClient {
    pub fn new(script: impl IntoIterator<Item = CompletionResponse>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().map(Ok).collect()),
            ..Self::default()
        }
    }

    /// Answers every call with the same response.
    pub fn repeating(response: CompletionResponse) -> Self {
        Self {
            repeat: Some(response),
            ..Self::default()
        }
    }

    pub fn failing(err: ExternalCallError) -> Self {
        Self {
            script: Mutex::new(VecDeque::from([Err(err)])),
            ..Self::default()
        }
    }

    /// Sleeps before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self) -> ExternalCallResult<CompletionResponse> {
        if let Some(response) = self.script.lock().unwrap().pop_front() {
            return response;
        }
        self.repeat
            .clone()
            .ok_or_else(|| ExternalCallError::Malformed("script exhausted".to_string()))
    }
}

impl CompletionClient for ScriptedCompletionClient {
    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> CompletionFuture<'a, ExternalCallResult<CompletionResponse>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.next()
        })
    }
}
