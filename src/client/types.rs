use crate::types::{GenerationResult, Usage};
use crate::Result;
use std::sync::{Mutex, MutexGuard};

/// Receives each non-empty delta together with the content accumulated so far.
///
/// Called synchronously inside the decode loop, in arrival order. Returning
/// an error ends the call with that error; it is never retried.
pub trait ChunkHandler: Send {
    fn on_chunk(&mut self, delta: &str, full: &str) -> Result<()>;
}

impl<F> ChunkHandler for F
where
    F: FnMut(&str, &str) -> Result<()> + Send,
{
    fn on_chunk(&mut self, delta: &str, full: &str) -> Result<()> {
        self(delta, full)
    }
}

/// Accumulator for one logical call, shared by every attempt of that call.
pub(crate) struct CallState<'h> {
    pub content: String,
    pub usage: Option<Usage>,
    /// Set once the handler has seen a delta. From then on nothing is retried.
    pub delivered: bool,
    pub handler: Option<&'h mut dyn ChunkHandler>,
}

impl<'h> CallState<'h> {
    pub fn new(handler: Option<&'h mut dyn ChunkHandler>) -> Self {
        Self {
            content: String::new(),
            usage: None,
            delivered: false,
            handler,
        }
    }

    /// Drop leftovers from an attempt that failed before delivering anything.
    pub fn reset_undelivered(&mut self) {
        if !self.delivered {
            self.content.clear();
            self.usage = None;
        }
    }

    pub fn push_delta(&mut self, text: &str, usage: Option<Usage>) -> Result<()> {
        if usage.is_some() {
            self.usage = usage;
        }
        if text.is_empty() {
            return Ok(());
        }
        self.content.push_str(text);
        if let Some(handler) = self.handler.as_mut() {
            self.delivered = true;
            handler.on_chunk(text, &self.content)?;
        }
        Ok(())
    }

    pub fn finish(&self, succeeded: bool) -> GenerationResult {
        if succeeded {
            GenerationResult::success(self.content.clone(), self.usage)
        } else {
            GenerationResult::failed(self.content.clone(), self.usage)
        }
    }
}

/// Lock that survives a panicked chunk handler on another attempt.
pub(crate) fn lock_state<'a, 'h>(state: &'a Mutex<CallState<'h>>) -> MutexGuard<'a, CallState<'h>> {
    state.lock().unwrap_or_else(|p| p.into_inner())
}
