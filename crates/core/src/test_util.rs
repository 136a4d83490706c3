//! Test doubles shared by the workspace's test suites.
//!
//! Enabled with the `test-util` feature; never compiled into release builds.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::ProviderError;
use crate::message::Message;
use crate::provider::{ChatOptions, Provider};

/// A provider that replays scripted chat replies and embeds text as a
/// hashed bag of words.
///
/// Each call to `chat` pops the next reply. Once the script is exhausted it
/// keeps returning the `repeat` reply if one was set, otherwise an error.
/// Texts sharing words get embeddings with high cosine similarity, which is
/// enough to exercise ranking deterministically.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    repeat: Option<String>,
    dim: usize,
    chat_calls: AtomicUsize,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
            repeat: None,
            dim: 64,
            chat_calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// A provider that answers every chat call with `reply`.
    pub fn repeating(reply: &str) -> Self {
        Self {
            repeat: Some(reply.to_string()),
            ..Self::new(Vec::new())
        }
    }

    /// Embedding dimension (default 64).
    pub fn with_dim(mut self, dim: usize) -> Self {
        self.dim = dim;
        self
    }

    /// Queue a chat failure after the replies queued so far.
    pub fn then_error(self, err: ProviderError) -> Self {
        self.replies.lock().unwrap().push_back(Err(err));
        self
    }

    /// Queue another reply after everything queued so far.
    pub fn then_reply(self, reply: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(reply.to_string()));
        self
    }

    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    /// Every message sequence passed to `chat`, in call order.
    pub fn seen(&self) -> Vec<Vec<Message>> {
        self.seen.lock().unwrap().clone()
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dim];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            // FNV-1a
            let mut h: u64 = 0xcbf29ce484222325;
            for b in word.bytes() {
                h ^= b as u64;
                h = h.wrapping_mul(0x100000001b3);
            }
            v[(h % self.dim as u64) as usize] += 1.0;
        }
        v
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, messages: &[Message], _options: ChatOptions) -> Result<String, ProviderError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(messages.to_vec());
        match self.replies.lock().unwrap().pop_front() {
            Some(reply) => reply,
            None => self
                .repeat
                .clone()
                .ok_or_else(|| ProviderError::Network("scripted provider exhausted".into())),
        }
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(inputs.iter().map(|t| self.embed_text(t)).collect())
    }
}
