//! The protocol engine: scheduler, reply parser driver, and connection
//! supervisor in one message-driven actor.
//!
//! All mutation of queue and state happens inside [`Engine::handle`],
//! which consumes a single mailbox fed by the public handle, the
//! transport read loops, and the timer tasks.

use crate::actor::{emit, Actor};
use crate::arbiter::LockArbiter;
use crate::config::EngineConfig;
use crate::constants::WATCHDOG_MS;
use crate::errors::EngineError;
use crate::events::EngineEvent;
use crate::messages::{EngineMessage, ReplySink};
use crate::queue::{Exchange, RequestQueue};
use crate::state::EngineState;
use crate::watchdog::{spawn_reconnect, spawn_watchdog, TimeoutHandle};
use core_types::wire::status;
use core_types::{DeviceError, LinkEvent, Reply, ReplyStatus, Transport, TransportFactory};
use futures::stream::StreamExt;
use futures::SinkExt;
use futures_channel::mpsc;
use std::time::Duration;
use tracing::{debug, trace, warn};

pub struct Engine<F: TransportFactory> {
    factory: F,
    port: String,
    config: EngineConfig,

    state: EngineState,
    queue: RequestQueue,
    arbiter: LockArbiter,

    transport: Option<F::Transport>,
    /// Monotonically increasing per-transport id; link events stamped
    /// with an older id come from a superseded transport and are ignored.
    instance: u64,
    closing: bool,

    watchdog: Option<TimeoutHandle>,
    watchdog_generation: u64,
    reconnect: Option<TimeoutHandle>,

    self_tx: mpsc::Sender<EngineMessage>,
    event_tx: mpsc::Sender<EngineEvent>,
}

impl<F: TransportFactory> Engine<F> {
    pub fn new(
        factory: F,
        port: String,
        config: EngineConfig,
        self_tx: mpsc::Sender<EngineMessage>,
        event_tx: mpsc::Sender<EngineEvent>,
    ) -> Self {
        Self {
            factory,
            port,
            config,
            state: EngineState::Idle,
            queue: RequestQueue::new(),
            arbiter: LockArbiter::new(),
            transport: None,
            instance: 0,
            closing: false,
            watchdog: None,
            watchdog_generation: 0,
            reconnect: None,
            self_tx,
            event_tx,
        }
    }

    fn emit(&self, event: EngineEvent) {
        emit(&self.event_tx, event);
    }

    fn transition(&mut self, new_state: EngineState) {
        if !self.state.can_transition_to(new_state) {
            warn!("invalid transition {:?} -> {:?}", self.state, new_state);
            return;
        }
        if self.state != new_state {
            debug!("state: {:?} -> {:?}", self.state, new_state);
        }
        self.state = new_state;
    }

    // ------------------------------------------------------------------
    // Watchdog and reconnect timers
    // ------------------------------------------------------------------

    /// Arm (or re-arm) the watchdog. Bumping the generation invalidates
    /// any fire already queued from the previous registration.
    fn arm_watchdog(&mut self) {
        self.watchdog_generation = self.watchdog_generation.wrapping_add(1);
        if let Some(handle) = self.watchdog.take() {
            handle.cancel();
        }
        self.watchdog = Some(spawn_watchdog(
            self.self_tx.clone(),
            self.watchdog_generation,
            Duration::from_millis(WATCHDOG_MS),
        ));
    }

    fn disarm_watchdog(&mut self) {
        self.watchdog_generation = self.watchdog_generation.wrapping_add(1);
        if let Some(handle) = self.watchdog.take() {
            handle.cancel();
        }
    }

    fn schedule_reconnect(&mut self) {
        if self.closing || self.reconnect.is_some() {
            return;
        }
        debug!(
            "scheduling reconnect every {}ms",
            self.config.reconnect_interval_ms
        );
        self.reconnect = Some(spawn_reconnect(
            self.self_tx.clone(),
            Duration::from_millis(self.config.reconnect_interval_ms),
        ));
    }

    fn cancel_reconnect(&mut self) {
        if let Some(handle) = self.reconnect.take() {
            handle.cancel();
        }
    }

    // ------------------------------------------------------------------
    // Scheduler
    // ------------------------------------------------------------------

    /// Dispatch the head of the queue if the engine is idle.
    async fn advance(&mut self) {
        if self.state != EngineState::Idle || self.queue.is_empty() {
            return;
        }
        if self.transport.is_none() {
            self.queue.fail_all(EngineError::Disconnected);
            return;
        }

        self.transition(EngineState::Sending);
        let payload = match self.queue.peek_head() {
            Some(head) => head.payload.clone(),
            None => return,
        };
        debug!("dispatching {} byte command", payload.len());

        let result = match self.transport.as_mut() {
            Some(transport) => transport.write(&payload).await,
            None => return,
        };
        match result {
            Ok(()) => self.arm_watchdog(),
            Err(e) => {
                warn!("write failed: {}", e);
                self.transition(EngineState::Idle);
                if let Some(head) = self.queue.pop_head() {
                    head.complete(Err(EngineError::Transport(e.to_string())));
                }
                self.emit(EngineEvent::Error {
                    message: e.to_string(),
                });
                // A failed write means the port is unusable; recycle it.
                if let Some(mut transport) = self.transport.take() {
                    transport.close().await;
                }
                self.schedule_reconnect();
            }
        }
    }

    /// Complete the in-flight head and move on to the next entry.
    async fn complete_head(&mut self, result: Result<Reply, EngineError>) {
        self.disarm_watchdog();
        if let Some(head) = self.queue.pop_head() {
            head.complete(result);
        }
        self.transition(EngineState::Idle);
        self.advance().await;
    }

    // ------------------------------------------------------------------
    // Reply parsing
    // ------------------------------------------------------------------

    /// Feed one inbound delivery through the reply state machine. Packed
    /// replies are handled by iterating over the remainder rather than
    /// recursing.
    async fn on_data(&mut self, bytes: &[u8]) {
        let mut saw_wait_confirm = false;
        let mut rest: &[u8] = bytes;
        while !rest.is_empty() {
            rest = match self.state {
                EngineState::Idle => {
                    trace!("discarding {} unsolicited bytes", rest.len());
                    &[]
                }
                EngineState::Sending => self.step_status(rest, &mut saw_wait_confirm).await,
                EngineState::Reading => self.step_output(rest, &mut saw_wait_confirm).await,
            };
        }

        match self.state {
            EngineState::Idle => {}
            EngineState::Reading => self.arm_watchdog(),
            EngineState::Sending => {
                // WAIT_USER_CONFIRM suspends the watchdog until the next
                // inbound delivery.
                if saw_wait_confirm {
                    self.disarm_watchdog();
                } else {
                    self.arm_watchdog();
                }
            }
        }
    }

    /// Interpret the first byte of a fresh reply while `Sending`.
    async fn step_status<'a>(
        &mut self,
        data: &'a [u8],
        saw_wait_confirm: &mut bool,
    ) -> &'a [u8] {
        let Some((&byte, rest)) = data.split_first() else {
            return &[];
        };

        match byte {
            status::OK | status::SEND_INPUT | status::REJECTED => {
                if let Some(reply_status) = ReplyStatus::from_byte(byte) {
                    // The notification belonged to the exchange completing
                    // here; it must not suppress the watchdog of whatever
                    // dispatches next.
                    *saw_wait_confirm = false;
                    self.complete_head(Ok(Reply::Status(reply_status))).await;
                }
                rest
            }
            status::OUTPUT_BEGIN => {
                debug!("output payload follows");
                self.transition(EngineState::Reading);
                if let Some(head) = self.queue.peek_head_mut() {
                    head.decoder.reset();
                }
                rest
            }
            status::WAIT_USER_CONFIRM => {
                debug!("device awaiting user confirmation");
                *saw_wait_confirm = true;
                self.emit(EngineEvent::WaitUserConfirm);
                rest
            }
            status::LOCKED => {
                self.emit(EngineEvent::Locked);
                if self.config.reject_on_locked {
                    self.disarm_watchdog();
                    self.queue.fail_all(EngineError::Locked);
                    self.transition(EngineState::Idle);
                }
                // Otherwise the head stays in flight; a later terminal
                // byte in this same delivery still completes it.
                rest
            }
            byte if byte >= status::ERROR_MIN => {
                let error = DeviceError::from_byte(byte)
                    .map(EngineError::Device)
                    .unwrap_or(EngineError::UnknownResponse(byte));
                *saw_wait_confirm = false;
                self.complete_head(Err(error)).await;
                rest
            }
            byte => {
                *saw_wait_confirm = false;
                self.complete_head(Err(EngineError::UnknownResponse(byte)))
                    .await;
                rest
            }
        }
    }

    /// Feed payload bytes to the head's decoder while `Reading`. Bytes
    /// after OUTPUT_END within the same delivery are discarded: the
    /// device ends framing there.
    async fn step_output<'a>(
        &mut self,
        data: &'a [u8],
        saw_wait_confirm: &mut bool,
    ) -> &'a [u8] {
        let decoded = match self.queue.peek_head_mut() {
            Some(head) => head.decoder.push(data),
            None => {
                self.transition(EngineState::Idle);
                return &[];
            }
        };
        if let Some(payload) = decoded {
            *saw_wait_confirm = false;
            self.complete_head(Ok(Reply::Output(payload))).await;
        }
        &[]
    }

    // ------------------------------------------------------------------
    // Link supervision
    // ------------------------------------------------------------------

    async fn handle_link(&mut self, instance: u64, event: LinkEvent) {
        if instance != self.instance || self.transport.is_none() {
            trace!("ignoring stale link event from transport #{}", instance);
            return;
        }
        match event {
            LinkEvent::Data(bytes) => self.on_data(&bytes).await,
            LinkEvent::Error(e) => {
                warn!("link error: {}", e);
                self.emit(EngineEvent::Error {
                    message: e.to_string(),
                });
            }
            LinkEvent::Closed => self.on_link_closed().await,
        }
    }

    async fn on_link_closed(&mut self) {
        debug!("link closed");
        self.transport = None;
        self.emit(EngineEvent::Close);
        if self.closing {
            return;
        }

        // Only the in-flight exchange is failed; waiters survive the
        // outage and dispatch once the link is back.
        if self.state.in_flight() {
            self.disarm_watchdog();
            if let Some(head) = self.queue.pop_head() {
                head.complete(Err(EngineError::Disconnected));
            }
            self.transition(EngineState::Idle);
        }
        self.emit(EngineEvent::Failed {
            message: "link closed unexpectedly".into(),
        });
        self.schedule_reconnect();
    }

    async fn try_open(&mut self) -> Result<(), EngineError> {
        if self.transport.is_some() {
            return Ok(());
        }
        match self
            .factory
            .open(&self.port, &self.config.serial_config())
            .await
        {
            Ok((transport, link_rx)) => {
                self.instance = self.instance.wrapping_add(1);
                spawn_link_forwarder(link_rx, self.instance, self.self_tx.clone());
                self.transport = Some(transport);
                self.cancel_reconnect();
                debug!("transport #{} open on {}", self.instance, self.port);
                self.emit(EngineEvent::Open);
                self.advance().await;
                Ok(())
            }
            Err(e) => {
                warn!("open {} failed: {}", self.port, e);
                self.emit(EngineEvent::Failed {
                    message: e.to_string(),
                });
                self.schedule_reconnect();
                Err(EngineError::Transport(e.to_string()))
            }
        }
    }

    // ------------------------------------------------------------------
    // API commands
    // ------------------------------------------------------------------

    async fn handle_send(&mut self, payload: Vec<u8>, prepend: bool, done: ReplySink) {
        if self.transport.is_none() {
            let _ = done.send(Err(EngineError::Disconnected));
            return;
        }
        let exchange = Exchange::new(payload, done);
        if prepend && self.state.in_flight() {
            self.queue.insert_after_head(exchange);
        } else if prepend {
            self.queue.push_head(exchange);
        } else {
            self.queue.push_tail(exchange);
        }
        self.advance().await;
    }

    async fn handle_open(&mut self, port: Option<String>) -> Result<(), EngineError> {
        self.closing = false;
        if let Some(port) = port {
            if port != self.port {
                // Fresh target: discard the current link, if any.
                if let Some(mut transport) = self.transport.take() {
                    transport.close().await;
                }
                self.port = port;
            }
        }
        self.try_open().await
    }

    async fn handle_close(&mut self) {
        debug!("closing");
        self.closing = true;
        self.clear();
        self.cancel_reconnect();
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
        }
        self.emit(EngineEvent::Close);
    }

    /// Fail everything pending with `Cleared`, release all locks, return
    /// to idle.
    fn clear(&mut self) {
        self.disarm_watchdog();
        self.queue.fail_all(EngineError::Cleared);
        self.transition(EngineState::Idle);
        self.arbiter.clear();
    }

    async fn handle_watchdog(&mut self, generation: u64) {
        if generation != self.watchdog_generation {
            trace!("ignoring stale watchdog fire #{}", generation);
            return;
        }
        if !self.state.in_flight() {
            return;
        }
        warn!("watchdog elapsed, failing in-flight exchange");
        self.disarm_watchdog();
        if let Some(head) = self.queue.pop_head() {
            head.complete(Err(EngineError::Watchdog));
        }
        self.transition(EngineState::Idle);
        self.advance().await;
    }

    async fn handle_reconnect_tick(&mut self) {
        if self.closing || self.transport.is_some() {
            return;
        }
        let _ = self.try_open().await;
    }
}

#[async_trait::async_trait]
impl<F: TransportFactory> Actor for Engine<F> {
    type Message = EngineMessage;

    fn name(&self) -> &'static str {
        "Engine"
    }

    async fn init(&mut self) {
        let _ = self.try_open().await;
    }

    async fn handle(&mut self, msg: EngineMessage) {
        match msg {
            EngineMessage::Send {
                payload,
                prepend,
                done,
            } => self.handle_send(payload, prepend, done).await,
            EngineMessage::Lock { granted } => self.arbiter.lock(granted),
            EngineMessage::Unlock => self.arbiter.unlock(),
            EngineMessage::Locked { reply } => {
                let _ = reply.send(self.arbiter.locked());
            }
            EngineMessage::Clear { done } => {
                self.clear();
                let _ = done.send(());
            }
            EngineMessage::Close { done } => {
                self.handle_close().await;
                let _ = done.send(());
            }
            EngineMessage::Open { port, done } => {
                let result = self.handle_open(port).await;
                let _ = done.send(result);
            }
            EngineMessage::Link { instance, event } => self.handle_link(instance, event).await,
            EngineMessage::WatchdogElapsed { generation } => {
                self.handle_watchdog(generation).await
            }
            EngineMessage::ReconnectTick => self.handle_reconnect_tick().await,
        }
    }

    async fn shutdown(&mut self) {
        self.closing = true;
        self.clear();
        self.cancel_reconnect();
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
        }
    }
}

fn spawn_link_forwarder(
    mut link_rx: mpsc::Receiver<LinkEvent>,
    instance: u64,
    mut tx: mpsc::Sender<EngineMessage>,
) {
    tokio::spawn(async move {
        while let Some(event) = link_rx.next().await {
            if tx
                .send(EngineMessage::Link { instance, event })
                .await
                .is_err()
            {
                return;
            }
        }
    });
}
