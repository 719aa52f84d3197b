//! Session lifecycle and the per-identity polling loops tied to it.
//!
//! One outer cycle is `Idle → Connecting → Running → Draining → Idle`. Loops
//! run only while a session is live; when the session is lost the writer is
//! closed first, then every loop is cancelled and joined before the next
//! connection attempt, so no loop ever outlives the session it was started
//! on.

use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    tokio::{
        sync::{mpsc, watch},
        task::{JoinHandle, JoinSet},
        time::Instant,
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

#[cfg(feature = "metrics")]
use logrelay_metrics::{counter, histogram, session as session_metrics};

use {
    logrelay_config::{ChannelMap, RelayConfig},
    logrelay_irc::{ChatOutbound, Connector, Error as IrcError, Session, SessionWriter},
    logrelay_logs::LogSource,
};

use crate::{DeliveryPipeline, NotificationGate, PollContext, PollLoop};

/// Where the supervisor is in its outer cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Connecting,
    Running,
    Draining,
}

/// Lifecycle notifications, in the order they happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    Connected { attempt: u64 },
    ConnectFailed { attempt: u64, error: String },
    LoopsStarted { count: usize },
    SessionLost { reason: String },
    /// Loops were joined; `acks` counts those that returned normally.
    Drained { acks: usize },
    Stopped,
}

/// Receives supervisor events.
#[async_trait]
pub trait SupervisorEventSink: Send + Sync {
    async fn emit(&self, event: SupervisorEvent);
}

#[async_trait]
impl SupervisorEventSink for mpsc::UnboundedSender<SupervisorEvent> {
    async fn emit(&self, event: SupervisorEvent) {
        if self.send(event).is_err() {
            debug!("supervisor event receiver dropped");
        }
    }
}

/// How a running session ended.
enum SessionEnd {
    Lost(String),
    Shutdown,
}

/// Keeps a chat session up and runs one polling loop per tracked identity on
/// it.
pub struct Supervisor {
    connector: Arc<dyn Connector>,
    channels: Arc<ChannelMap>,
    ctx: PollContext,
    reconnect_backoff: Duration,
    event_sink: Option<Arc<dyn SupervisorEventSink>>,
    state_tx: watch::Sender<SupervisorState>,
}

impl Supervisor {
    pub fn new(
        connector: Arc<dyn Connector>,
        source: Arc<dyn LogSource>,
        channels: ChannelMap,
        config: &RelayConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(SupervisorState::Idle);
        Self {
            connector,
            channels: Arc::new(channels),
            ctx: PollContext {
                source,
                gate: Arc::new(NotificationGate::new(config.timing.stale_threshold())),
                pipeline: Arc::new(DeliveryPipeline::new(
                    config.timing.spoiler_delay(),
                    config.logs.base_url.clone(),
                )),
                poll_interval: config.timing.poll_interval(),
            },
            reconnect_backoff: config.timing.reconnect_backoff(),
            event_sink: None,
            state_tx,
        }
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn SupervisorEventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Watch the outer-cycle state.
    pub fn subscribe_state(&self) -> watch::Receiver<SupervisorState> {
        self.state_tx.subscribe()
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// Connection failures and session losses are retried forever after the
    /// constant reconnect backoff.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            identities = self.channels.len(),
            backoff = ?self.reconnect_backoff,
            "supervisor starting"
        );

        let mut attempt: u64 = 0;
        while !shutdown.is_cancelled() {
            attempt += 1;
            self.set_state(SupervisorState::Connecting);

            #[cfg(feature = "metrics")]
            counter!(session_metrics::CONNECT_ATTEMPTS_TOTAL).increment(1);

            let connected = tokio::select! {
                () = shutdown.cancelled() => break,
                result = self.connector.connect() => result,
            };

            match connected {
                Ok(session) => {
                    info!(attempt, "connected");
                    self.emit(SupervisorEvent::Connected { attempt }).await;
                    attempt = 0;
                    if let SessionEnd::Shutdown = self.run_session(session, &shutdown).await {
                        break;
                    }
                },
                Err(e) => {
                    #[cfg(feature = "metrics")]
                    counter!(session_metrics::CONNECT_ERRORS_TOTAL).increment(1);

                    warn!(attempt, stage = "connect", error = %e, "connection failed");
                    self.emit(SupervisorEvent::ConnectFailed {
                        attempt,
                        error: e.to_string(),
                    })
                    .await;
                },
            }

            self.set_state(SupervisorState::Idle);
            info!(backoff = ?self.reconnect_backoff, "reconnecting after backoff");
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(self.reconnect_backoff) => {},
            }
        }

        self.set_state(SupervisorState::Idle);
        info!("supervisor stopped");
        self.emit(SupervisorEvent::Stopped).await;
    }

    async fn run_session(&self, session: Session, shutdown: &CancellationToken) -> SessionEnd {
        let started = Instant::now();
        let writer = session.writer();
        let outbound: Arc<dyn ChatOutbound> = Arc::new(writer.clone());
        let mut reader = tokio::spawn(session.read_loop());

        let loops_cancel = shutdown.child_token();
        let session_lost = CancellationToken::new();
        let mut loops = JoinSet::new();
        for (identity, destination) in self.channels.iter() {
            let poll =
                PollLoop::new(identity, destination, self.ctx.clone(), Arc::clone(&outbound));
            loops.spawn(poll.run(loops_cancel.clone(), session_lost.clone()));
        }
        let count = loops.len();

        self.set_state(SupervisorState::Running);
        info!(loops = count, "polling loops started");
        self.emit(SupervisorEvent::LoopsStarted { count }).await;

        let end = tokio::select! {
            joined = &mut reader => {
                let reason = match joined {
                    Ok(err) => err.to_string(),
                    Err(join_err) => format!("reader task failed: {join_err}"),
                };
                SessionEnd::Lost(reason)
            },
            () = session_lost.cancelled() => SessionEnd::Lost("write to session failed".into()),
            () = shutdown.cancelled() => SessionEnd::Shutdown,
        };

        self.set_state(SupervisorState::Draining);
        if let SessionEnd::Lost(reason) = &end {
            #[cfg(feature = "metrics")]
            counter!(session_metrics::LOST_TOTAL).increment(1);

            warn!(reason = %reason, "session lost, draining loops");
            writer.close().await;
            self.emit(SupervisorEvent::SessionLost {
                reason: reason.clone(),
            })
            .await;
        } else {
            info!("shutdown requested, draining loops");
        }

        let acks = drain(&mut loops, &loops_cancel).await;
        close_session(&writer, reader).await;

        #[cfg(feature = "metrics")]
        histogram!(session_metrics::DURATION_SECONDS).record(started.elapsed().as_secs_f64());

        info!(acks, expected = count, uptime = ?started.elapsed(), "loops drained");
        self.emit(SupervisorEvent::Drained { acks }).await;
        end
    }

    fn set_state(&self, state: SupervisorState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "supervisor state");
        }
    }

    async fn emit(&self, event: SupervisorEvent) {
        if let Some(sink) = &self.event_sink {
            sink.emit(event).await;
        }
    }
}

/// Cancel every loop and wait for all of them to end.
///
/// Returns the number of loops that acknowledged the stop. A loop that
/// panicked or was aborted is joined but not counted.
async fn drain(loops: &mut JoinSet<String>, cancel: &CancellationToken) -> usize {
    cancel.cancel();
    let mut acks = 0;
    while let Some(joined) = loops.join_next().await {
        match joined {
            Ok(identity) => {
                acks += 1;
                debug!(identity, "loop acknowledged stop");
            },
            Err(e) => error!(error = %e, "polling loop task failed"),
        }
    }
    acks
}

async fn close_session(writer: &SessionWriter, reader: JoinHandle<IrcError>) {
    writer.close().await;
    reader.abort();
}
