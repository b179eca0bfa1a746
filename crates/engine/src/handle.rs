use crate::actor::Actor;
use crate::config::EngineConfig;
use crate::constants::{COMMAND_CHANNEL_CAPACITY, EVENT_CHANNEL_CAPACITY};
use crate::engine::Engine;
use crate::errors::EngineError;
use crate::events::EngineEvent;
use crate::messages::EngineMessage;
use core_types::{Payload, Reply, TransportFactory};
use futures::SinkExt;
use futures_channel::{mpsc, oneshot};
use std::future::Future;

/// Start an engine for one port.
///
/// Spawns the engine task (which immediately attempts to open the
/// transport) and returns the cloneable command handle plus the event
/// receiver. The engine lives for the rest of the process; `close()`
/// quiesces it, `open()` brings the port back.
pub fn start<F>(
    factory: F,
    port: impl Into<String>,
    config: EngineConfig,
) -> (EngineHandle, mpsc::Receiver<EngineEvent>)
where
    F: TransportFactory,
{
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

    let engine = Engine::new(factory, port.into(), config, cmd_tx.clone(), event_tx);
    tokio::spawn(engine.run(cmd_rx));

    (EngineHandle { cmd_tx }, event_rx)
}

/// Command handle to a running engine. Cheap to clone; all clones talk to
/// the same engine task.
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineMessage>,
}

impl EngineHandle {
    async fn command(&self, msg: EngineMessage) -> Result<(), EngineError> {
        self.cmd_tx
            .clone()
            .send(msg)
            .await
            .map_err(|_| EngineError::Shutdown)
    }

    async fn exchange(&self, payload: Payload, prepend: bool) -> Result<Reply, EngineError> {
        let (done, rx) = oneshot::channel();
        self.command(EngineMessage::Send {
            payload: payload.into_bytes(),
            prepend,
            done,
        })
        .await?;
        rx.await.map_err(|_| EngineError::Shutdown)?
    }

    /// Enqueue a command and await its reply: a terminal status byte, or
    /// the decoded output payload when the device delivered one.
    pub async fn send(&self, payload: impl Into<Payload>) -> Result<Reply, EngineError> {
        self.exchange(payload.into(), false).await
    }

    /// Like [`EngineHandle::send`], but inserted ahead of all waiting
    /// exchanges (never ahead of the one already in flight).
    pub async fn send_prepend(&self, payload: impl Into<Payload>) -> Result<Reply, EngineError> {
        self.exchange(payload.into(), true).await
    }

    /// Take the cooperative lock; resolves when the lock is granted
    /// (immediately if nobody holds it, FIFO otherwise).
    pub async fn lock(&self) -> Result<(), EngineError> {
        let (granted, rx) = oneshot::channel();
        self.command(EngineMessage::Lock { granted }).await?;
        rx.await.map_err(|_| EngineError::Shutdown)?
    }

    /// Release the oldest outstanding lock.
    pub async fn unlock(&self) -> Result<(), EngineError> {
        self.command(EngineMessage::Unlock).await
    }

    /// Run `f` while holding the lock; the lock is released on every exit
    /// path. `f` must return a future — the compiler enforces what the
    /// original runtime check only asserted.
    pub async fn sequence<F, Fut, T>(&self, f: F) -> Result<T, EngineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        self.lock().await?;
        let result = f().await;
        let _ = self.unlock().await;
        result
    }

    /// Whether at least one lock is currently held.
    pub async fn locked(&self) -> Result<bool, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.command(EngineMessage::Locked { reply }).await?;
        rx.await.map_err(|_| EngineError::Shutdown)
    }

    /// Fail every pending exchange with `Cleared` and release all locks.
    pub async fn clear(&self) -> Result<(), EngineError> {
        let (done, rx) = oneshot::channel();
        self.command(EngineMessage::Clear { done }).await?;
        rx.await.map_err(|_| EngineError::Shutdown)
    }

    /// Close the transport and stop reconnecting. Idempotent; pending
    /// work resolves with `Cleared` and later sends fail `Disconnected`
    /// until a successful [`EngineHandle::open`].
    pub async fn close(&self) -> Result<(), EngineError> {
        let (done, rx) = oneshot::channel();
        self.command(EngineMessage::Close { done }).await?;
        rx.await.map_err(|_| EngineError::Shutdown)
    }

    /// (Re)open the transport, optionally on a different port. Idempotent
    /// when the transport is already open.
    pub async fn open(&self, port: Option<String>) -> Result<(), EngineError> {
        let (done, rx) = oneshot::channel();
        self.command(EngineMessage::Open { port, done }).await?;
        rx.await.map_err(|_| EngineError::Shutdown)?
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_commands_fail_shutdown_once_engine_is_gone() {
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let handle = EngineHandle { cmd_tx };
        drop(cmd_rx);

        assert_eq!(handle.send([2u8]).await, Err(EngineError::Shutdown));
        assert_eq!(handle.lock().await, Err(EngineError::Shutdown));
        assert_eq!(handle.locked().await, Err(EngineError::Shutdown));
    }
}
