//! Deterministic fake agents for pipeline and verifier tests. No network,
//! no sleeping: pair these with zero-backoff retry policies and zero
//! pacing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use ai_client::{ChatAgent, EmbedAgent};
use anyhow::{anyhow, Result};
use async_trait::async_trait;

// =============================================================================
// FakeEmbedAgent
// =============================================================================

/// Embedding agent backed by a fixed text → vector map.
///
/// `failing_batches(n)` makes the next `n` calls (single or batch) fail,
/// simulating transient provider errors. `truncating_responses()` returns
/// one vector fewer than requested, simulating a broken positional
/// contract.
pub struct FakeEmbedAgent {
    vectors: HashMap<String, Vec<f32>>,
    failures_remaining: AtomicUsize,
    truncate: bool,
    batch_calls: AtomicUsize,
    single_calls: AtomicUsize,
    embedded: Mutex<Vec<String>>,
}

impl FakeEmbedAgent {
    pub fn new() -> Self {
        Self {
            vectors: HashMap::new(),
            failures_remaining: AtomicUsize::new(0),
            truncate: false,
            batch_calls: AtomicUsize::new(0),
            single_calls: AtomicUsize::new(0),
            embedded: Mutex::new(Vec::new()),
        }
    }

    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    pub fn failing_batches(self, n: usize) -> Self {
        self.failures_remaining.store(n, Ordering::SeqCst);
        self
    }

    pub fn truncating_responses(mut self) -> Self {
        self.truncate = true;
        self
    }

    /// Every text actually sent to the model, in call order.
    pub fn embedded_texts(&self) -> Vec<String> {
        self.embedded.lock().unwrap().clone()
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        self.failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn lookup(&self, text: &str) -> Result<Vec<f32>> {
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| anyhow!("no vector registered for '{text}'"))
    }
}

impl Default for FakeEmbedAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbedAgent for FakeEmbedAgent {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        if self.take_failure() {
            return Err(anyhow!("simulated embedding failure"));
        }
        self.embedded.lock().unwrap().push(text.to_string());
        self.lookup(text)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.take_failure() {
            return Err(anyhow!("simulated embedding batch failure"));
        }
        self.embedded.lock().unwrap().extend(texts.iter().cloned());

        let mut vectors = texts
            .iter()
            .map(|t| self.lookup(t))
            .collect::<Result<Vec<_>>>()?;
        if self.truncate {
            vectors.pop();
        }
        Ok(vectors)
    }
}

// =============================================================================
// FakeChatAgent
// =============================================================================

enum ChatBehavior {
    Reply(String),
    Fail,
}

/// Chat agent with a single scripted behavior, optionally failing the
/// first `n` calls to exercise retry paths.
pub struct FakeChatAgent {
    behavior: ChatBehavior,
    fail_first: AtomicUsize,
    calls: AtomicUsize,
}

impl FakeChatAgent {
    pub fn replying(reply: &str) -> Self {
        Self {
            behavior: ChatBehavior::Reply(reply.to_string()),
            fail_first: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn no_match() -> Self {
        Self::replying("None")
    }

    pub fn failing() -> Self {
        Self {
            behavior: ChatBehavior::Fail,
            fail_first: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_first(self, n: usize) -> Self {
        self.fail_first.store(n, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatAgent for FakeChatAgent {
    async fn chat_completion(&self, _system: &str, _user: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let should_fail = self
            .fail_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(anyhow!("simulated chat failure"));
        }

        match &self.behavior {
            ChatBehavior::Reply(reply) => Ok(reply.clone()),
            ChatBehavior::Fail => Err(anyhow!("simulated chat failure")),
        }
    }
}
