//! Scripted doubles for the pipeline's ports.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use anyhow::{bail, Result};

use crate::ai::transport::{HttpRequest, HttpResponse, Transport, TransportError};
use crate::git::RepositoryReader;
use crate::utils::clipboard::Clipboard;
use crate::utils::interaction::Interaction;

/// Transport returning a pre-programmed queue of outcomes.
///
/// Outcomes are returned in FIFO order. When the queue is exhausted,
/// further sends fail with a non-network error. Every request is recorded.
pub(crate) struct ScriptedTransport {
    outcomes: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new(outcomes: Vec<Result<HttpResponse, TransportError>>) -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::from(outcomes)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests sent so far, in order.
    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Outcomes not yet consumed.
    pub(crate) fn remaining(&self) -> usize {
        self.outcomes.lock().unwrap().len()
    }
}

impl Transport for ScriptedTransport {
    fn send<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + 'a>> {
        self.requests.lock().unwrap().push(request);
        let next = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other("no more scripted responses".into())));
        Box::pin(async move { next })
    }
}

/// Interaction answering from queues and recording every prompt.
///
/// Exhausted queues decline confirmations and return no selection.
#[derive(Default)]
pub(crate) struct ScriptedInteraction {
    confirmations: VecDeque<bool>,
    selections: VecDeque<Option<usize>>,
    prompts: Vec<String>,
}

impl ScriptedInteraction {
    pub(crate) fn with_confirmations(mut self, answers: Vec<bool>) -> Self {
        self.confirmations = answers.into();
        self
    }

    pub(crate) fn with_selections(mut self, answers: Vec<Option<usize>>) -> Self {
        self.selections = answers.into();
        self
    }

    /// Every confirm message and select prompt, in order.
    pub(crate) fn prompts(&self) -> &[String] {
        &self.prompts
    }
}

impl Interaction for ScriptedInteraction {
    fn confirm(&mut self, message: &str) -> Result<bool> {
        self.prompts.push(message.to_string());
        Ok(self.confirmations.pop_front().unwrap_or(false))
    }

    fn select(&mut self, prompt: &str, _choices: &[String]) -> Result<Option<usize>> {
        self.prompts.push(prompt.to_string());
        Ok(self.selections.pop_front().flatten())
    }
}

/// Repository with a fixed diff.
pub(crate) struct FakeRepository {
    pub(crate) is_repository: bool,
    pub(crate) diff: String,
}

impl FakeRepository {
    pub(crate) fn with_diff(diff: impl Into<String>) -> Self {
        Self {
            is_repository: true,
            diff: diff.into(),
        }
    }

    pub(crate) fn not_a_repository() -> Self {
        Self {
            is_repository: false,
            diff: String::new(),
        }
    }
}

impl RepositoryReader for FakeRepository {
    fn is_repository(&self) -> Result<bool> {
        Ok(self.is_repository)
    }

    fn get_diff(&self) -> Result<String> {
        if !self.is_repository {
            bail!("Not in a git repository");
        }
        Ok(self.diff.clone())
    }
}

/// Clipboard that records copies, or fails every copy.
#[derive(Default)]
pub(crate) struct RecordingClipboard {
    pub(crate) copied: Vec<String>,
    pub(crate) fail: bool,
}

impl Clipboard for RecordingClipboard {
    fn set_text(&mut self, text: &str) -> Result<()> {
        if self.fail {
            bail!("clipboard unavailable");
        }
        self.copied.push(text.to_string());
        Ok(())
    }
}
