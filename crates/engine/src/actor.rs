use crate::events::EngineEvent;
use async_trait::async_trait;
use futures::stream::StreamExt;
use futures_channel::mpsc;
use tracing::{debug, warn};

/// Message-driven component with a sequential run loop.
///
/// The engine is the only implementor, but the lifecycle is kept behind a
/// trait so tests can drive `init`/`handle`/`shutdown` directly without
/// spawning.
///
/// # Lifecycle
///
/// 1. **init()** — once, before message processing starts
/// 2. **handle()** — for each received message, strictly in order
/// 3. **shutdown()** — when every sender is gone
#[async_trait]
pub trait Actor: Send + 'static {
    type Message: Send + 'static;

    /// Actor name, used for logging.
    fn name(&self) -> &'static str;

    /// Initialize before processing messages.
    async fn init(&mut self) {}

    /// Handle a single message.
    async fn handle(&mut self, msg: Self::Message);

    /// Clean up before the task ends.
    async fn shutdown(&mut self) {}

    /// Run the actor to completion on the given mailbox.
    async fn run(mut self, mut rx: mpsc::Receiver<Self::Message>)
    where
        Self: Sized,
    {
        self.init().await;
        debug!("{} started", self.name());

        while let Some(msg) = rx.next().await {
            self.handle(msg).await;
        }

        self.shutdown().await;
        debug!("{} stopped", self.name());
    }
}

/// Emit an event without blocking the engine; a full or closed receiver
/// only costs a log line.
pub fn emit(event_tx: &mpsc::Sender<EngineEvent>, event: EngineEvent) {
    if let Err(e) = event_tx.clone().try_send(event) {
        warn!("event dropped: {:?}", e);
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    struct Recorder {
        event_tx: mpsc::Sender<EngineEvent>,
    }

    #[async_trait]
    impl Actor for Recorder {
        type Message = u32;

        fn name(&self) -> &'static str {
            "Recorder"
        }

        async fn handle(&mut self, msg: u32) {
            emit(&self.event_tx, EngineEvent::Error {
                message: msg.to_string(),
            });
        }
    }

    #[tokio::test]
    async fn test_messages_processed_in_order() {
        let (mut tx, rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::channel(16);

        tx.try_send(1).unwrap();
        tx.try_send(2).unwrap();
        tx.try_send(3).unwrap();
        drop(tx);

        let actor = Recorder { event_tx };
        actor.run(rx).await;

        let events: Vec<_> = event_rx.collect().await;
        let rendered: Vec<String> = events
            .into_iter()
            .map(|e| match e {
                EngineEvent::Error { message } => message,
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        assert_eq!(rendered, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_emit_tolerates_dropped_receiver() {
        let (event_tx, event_rx) = mpsc::channel(1);
        drop(event_rx);
        emit(&event_tx, EngineEvent::Close); // must not panic
    }
}
