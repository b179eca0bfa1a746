use crate::errors::EngineError;
use crate::messages::ReplySink;
use core_types::Reply;
use framing::OutputDecoder;
use std::collections::VecDeque;

/// One request/response pair: the bytes to write plus the sink the caller
/// awaits, with the per-exchange payload decoder.
pub struct Exchange {
    pub payload: Vec<u8>,
    done: ReplySink,
    pub decoder: OutputDecoder,
}

impl Exchange {
    pub fn new(payload: Vec<u8>, done: ReplySink) -> Self {
        Self {
            payload,
            done,
            decoder: OutputDecoder::new(),
        }
    }

    /// Resolve the caller. Each exchange completes exactly once; a caller
    /// that dropped its receiver is simply no longer listening.
    pub fn complete(self, result: Result<Reply, EngineError>) {
        let _ = self.done.send(result);
    }
}

impl std::fmt::Debug for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exchange")
            .field("payload", &self.payload)
            .finish()
    }
}

/// FIFO of pending exchanges. The head is the one in flight whenever the
/// engine is not idle.
#[derive(Debug, Default)]
pub struct RequestQueue {
    entries: VecDeque<Exchange>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    pub fn push_tail(&mut self, exchange: Exchange) {
        self.entries.push_back(exchange);
    }

    /// Insert ahead of all waiters. Only valid while nothing is in
    /// flight; with a live head, use [`RequestQueue::insert_after_head`].
    pub fn push_head(&mut self, exchange: Exchange) {
        self.entries.push_front(exchange);
    }

    /// Insert directly behind the in-flight head: the entry becomes the
    /// new head of the pending portion without displacing the one in
    /// flight.
    pub fn insert_after_head(&mut self, exchange: Exchange) {
        let at = self.entries.len().min(1);
        self.entries.insert(at, exchange);
    }

    pub fn peek_head(&self) -> Option<&Exchange> {
        self.entries.front()
    }

    pub fn peek_head_mut(&mut self) -> Option<&mut Exchange> {
        self.entries.front_mut()
    }

    pub fn pop_head(&mut self) -> Option<Exchange> {
        self.entries.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Complete every pending exchange with the given error and empty the
    /// queue.
    pub fn fail_all(&mut self, error: EngineError) {
        for exchange in self.entries.drain(..) {
            exchange.complete(Err(error.clone()));
        }
    }
}
