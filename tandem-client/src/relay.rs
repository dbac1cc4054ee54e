use crate::config::ReconnectPolicy;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tandem_core::{ClientSignal, ServerSignal};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

type RelaySocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection state changes and envelopes coming from the relay.
#[derive(Debug)]
pub enum RelayEvent {
    Connected,
    Signal(ServerSignal),
    Disconnected,
    /// Reconnect attempts exhausted; no further events follow.
    GaveUp,
}

enum PumpEnd {
    Shutdown,
    Lost,
}

/// Owner side of the relay connection task.
pub struct RelayControl {
    outbound: mpsc::UnboundedSender<ClientSignal>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl RelayControl {
    /// Spawns the connection task; it connects, reconnects with backoff and
    /// forwards everything it receives into `events`.
    pub fn connect(
        url: String,
        policy: ReconnectPolicy,
        events: mpsc::UnboundedSender<RelayEvent>,
    ) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_relay(url, policy, outbound_rx, shutdown_rx, events));

        Self {
            outbound,
            shutdown: Some(shutdown),
            task: Some(task),
        }
    }

    /// Queues an envelope; false once the connection task is gone.
    pub fn send(&self, signal: ClientSignal) -> bool {
        self.outbound.send(signal).is_ok()
    }

    /// Flushes queued envelopes and closes the socket.
    pub async fn shutdown(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Relay connection task failed: {}", e);
            }
        }
    }
}

async fn run_relay(
    url: String,
    policy: ReconnectPolicy,
    mut outbound_rx: mpsc::UnboundedReceiver<ClientSignal>,
    mut shutdown_rx: oneshot::Receiver<()>,
    events: mpsc::UnboundedSender<RelayEvent>,
) {
    let mut attempt = 0u32;
    loop {
        let connected = tokio::select! {
            _ = &mut shutdown_rx => return,
            connected = connect_async(url.as_str()) => connected,
        };

        match connected {
            Ok((socket, _)) => {
                info!("Connected to signaling server at {}", url);
                attempt = 0;
                // Envelopes queued while offline belong to the previous session.
                while outbound_rx.try_recv().is_ok() {}
                let _ = events.send(RelayEvent::Connected);

                match pump(socket, &mut outbound_rx, &mut shutdown_rx, &events).await {
                    PumpEnd::Shutdown => return,
                    PumpEnd::Lost => {
                        warn!("Lost connection to signaling server");
                        let _ = events.send(RelayEvent::Disconnected);
                    }
                }
            }
            Err(e) => warn!("Could not reach signaling server at {}: {}", url, e),
        }

        attempt += 1;
        let Some(delay) = policy.delay_for(attempt) else {
            error!("Giving up on signaling server after {} retries", attempt - 1);
            let _ = events.send(RelayEvent::GaveUp);
            return;
        };
        info!("Reconnecting in {:?} (attempt {})", delay, attempt);

        tokio::select! {
            _ = &mut shutdown_rx => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn pump(
    socket: RelaySocket,
    outbound_rx: &mut mpsc::UnboundedReceiver<ClientSignal>,
    shutdown_rx: &mut oneshot::Receiver<()>,
    events: &mpsc::UnboundedSender<RelayEvent>,
) -> PumpEnd {
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            biased;

            signal = outbound_rx.recv() => {
                let Some(signal) = signal else {
                    let _ = sink.close().await;
                    return PumpEnd::Shutdown;
                };
                if let Err(e) = sink.send(encode(&signal)).await {
                    error!("Failed to send {:?} to signaling server: {}", signal, e);
                    return PumpEnd::Lost;
                }
            }
            _ = &mut *shutdown_rx => {
                while let Ok(signal) = outbound_rx.try_recv() {
                    match tokio::time::timeout(FLUSH_TIMEOUT, sink.send(encode(&signal))).await {
                        Ok(Ok(())) => {}
                        _ => break,
                    }
                }
                let _ = tokio::time::timeout(FLUSH_TIMEOUT, sink.close()).await;
                return PumpEnd::Shutdown;
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ServerSignal>(&text) {
                    Ok(signal) => {
                        debug!("Received {} from signaling server", signal.kind());
                        let _ = events.send(RelayEvent::Signal(signal));
                    }
                    Err(e) => warn!("Ignoring undecodable envelope: {}", e),
                },
                Some(Ok(Message::Close(_))) | None => return PumpEnd::Lost,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Signaling socket error: {}", e);
                    return PumpEnd::Lost;
                }
            },
        }
    }
}

fn encode(signal: &ClientSignal) -> Message {
    Message::Text(serde_json::to_string(signal).unwrap_or_default())
}
