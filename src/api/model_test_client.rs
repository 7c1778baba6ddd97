//! Implements the `Completion` trait with scripted responses for testing purposes.

use crate::api::Completion;
use crate::error::Res;
use anyhow::anyhow;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Returns queued responses in order and records every prompt it receives. A queued `Err` is
/// returned as a failed completion call.
pub(crate) struct TestModel {
    responses: VecDeque<std::result::Result<String, String>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl TestModel {
    pub(crate) fn new() -> Self {
        Self {
            responses: VecDeque::new(),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn respond(mut self, text: impl Into<String>) -> Self {
        self.responses.push_back(Ok(text.into()));
        self
    }

    pub(crate) fn fail(mut self, message: impl Into<String>) -> Self {
        self.responses.push_back(Err(message.into()));
        self
    }

    pub(crate) fn prompts(&self) -> Arc<Mutex<Vec<String>>> {
        self.prompts.clone()
    }
}

#[async_trait::async_trait]
impl Completion for TestModel {
    async fn complete(&mut self, prompt: &str) -> Res<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.responses.pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("TestModel has no more scripted responses")),
        }
    }
}
