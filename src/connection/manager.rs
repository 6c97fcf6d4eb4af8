use super::provider::{CallIdentity, ProviderCredentials, ProviderEvent, VoiceProvider};
use crate::config::ProviderConfig;
use crate::error::{ConnectionError, InitializationError};
use crate::transcript::{Role, Utterance};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Connection state of the live channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Error,
}

/// Observable state of the live channel
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,

    /// Candidate is speaking and being heard
    pub listening: bool,

    /// Interviewer is speaking
    pub speaking: bool,

    /// Message of the most recent failure, cleared on the next connect
    pub last_error: Option<String>,

    /// Provider-issued identity of the current call
    pub call: Option<CallIdentity>,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Idle,
            listening: false,
            speaking: false,
            last_error: None,
            call: None,
        }
    }
}

/// Event fanned out to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    StateChanged(ConnectionState),
    Identity(CallIdentity),
    Utterance(Utterance),
    Activity { listening: bool, speaking: bool },
    /// The provider ended the call, or the channel dropped
    ChannelClosed { reason: String, abnormal: bool },
}

/// Owns a single call to the voice provider
pub struct ConnectionManager {
    /// Transport
    provider: Arc<Mutex<Box<dyn VoiceProvider>>>,

    /// Provider identifiers as configured (validated on initialize)
    config: ProviderConfig,

    /// Whether initialize() has succeeded
    initialized: AtomicBool,

    /// Shared observable state
    status: Arc<RwLock<ConnectionStatus>>,

    /// Fan-out to observers and the owner
    events: Fanout,

    /// Bumped by every disconnect so an in-flight connect can tell it was cancelled
    disconnects: AtomicU64,

    /// Handle for the provider event pump
    pump_handle: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    pub fn new(provider: Box<dyn VoiceProvider>, config: ProviderConfig, event_buffer: usize) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(1));

        Self {
            provider: Arc::new(Mutex::new(provider)),
            config,
            initialized: AtomicBool::new(false),
            status: Arc::new(RwLock::new(ConnectionStatus::default())),
            events: Fanout {
                observers: events,
                owner: None,
            },
            disconnects: AtomicU64::new(0),
            pump_handle: Mutex::new(None),
        }
    }

    /// Like `new`, plus a receiver that gets every event in order
    ///
    /// `subscribe` receivers drop events when they fall behind; this one
    /// gets every event.
    pub fn with_events(
        provider: Box<dyn VoiceProvider>,
        config: ProviderConfig,
        event_buffer: usize,
    ) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (owner_tx, owner_rx) = mpsc::unbounded_channel();
        let mut manager = Self::new(provider, config, event_buffer);
        manager.events.owner = Some(owner_tx);
        (manager, owner_rx)
    }

    /// Validate credentials and prepare the provider. No-op once initialized.
    pub async fn initialize(&self) -> Result<(), InitializationError> {
        let mut provider = self.provider.lock().await;

        if self.initialized.load(Ordering::SeqCst) {
            debug!("Voice provider already initialized");
            return Ok(());
        }

        let credentials = ProviderCredentials::from_config(&self.config)?;

        provider.initialize(&credentials).await?;
        self.initialized.store(true, Ordering::SeqCst);

        info!("Voice provider {} initialized", provider.name());

        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Receive connection events. Subscribe before connecting to see every event.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.observers.subscribe()
    }

    /// Current observable state
    pub async fn status(&self) -> ConnectionStatus {
        self.status.read().await.clone()
    }

    /// Open the live channel
    ///
    /// Does not retry. On failure the state becomes `Error` and the caller may
    /// call `connect` again.
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        if !self.is_initialized() {
            return Err(ConnectionError::NotInitialized);
        }

        let epoch = self.disconnects.load(Ordering::SeqCst);

        {
            let mut status = self.status.write().await;
            if matches!(status.state, ConnectionState::Connecting | ConnectionState::Connected) {
                warn!("Connection already {:?}", status.state);
                return Ok(());
            }
            status.state = ConnectionState::Connecting;
            status.last_error = None;
            status.call = None;
        }
        self.emit(ConnectionEvent::StateChanged(ConnectionState::Connecting));

        let result = {
            let mut provider = self.provider.lock().await;
            info!("Connecting to voice provider {}", provider.name());
            provider.connect().await
        };

        let provider_rx = match result {
            Ok(rx) => rx,
            Err(e) => {
                error!("Failed to connect: {}", e);
                {
                    let mut status = self.status.write().await;
                    status.state = ConnectionState::Error;
                    status.last_error = Some(e.to_string());
                }
                self.emit(ConnectionEvent::StateChanged(ConnectionState::Error));
                return Err(e);
            }
        };

        let mut handle = self.pump_handle.lock().await;

        // disconnect() bumps the counter before taking this lock
        if self.disconnects.load(Ordering::SeqCst) != epoch {
            drop(handle);
            warn!("Disconnected while connecting, closing the new channel");
            drop(provider_rx);
            if let Err(e) = self.provider.lock().await.disconnect().await {
                warn!("Provider disconnect failed (ignored): {}", e);
            }
            return Err(ConnectionError::Cancelled);
        }

        self.status.write().await.state = ConnectionState::Connected;
        self.emit(ConnectionEvent::StateChanged(ConnectionState::Connected));

        info!("Live channel connected");

        let pump = tokio::spawn(Self::pump(
            provider_rx,
            Arc::clone(&self.status),
            self.events.clone(),
        ));

        if let Some(stale) = handle.replace(pump) {
            stale.abort();
        }

        Ok(())
    }

    /// Tear the channel down. Best-effort and safe to call in any state.
    pub async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        let pump = self.pump_handle.lock().await.take();

        let was_open = {
            let status = self.status.read().await;
            pump.is_some() || status.state == ConnectionState::Connecting
        };

        if !was_open {
            debug!("Disconnect requested with no open channel");
            return;
        }

        info!("Disconnecting live channel");

        {
            let mut provider = self.provider.lock().await;
            if let Err(e) = provider.disconnect().await {
                warn!("Provider disconnect failed (ignored): {}", e);
            }
        }

        if let Some(pump) = pump {
            pump.abort();
        }

        {
            let mut status = self.status.write().await;
            status.state = ConnectionState::Idle;
            status.listening = false;
            status.speaking = false;
        }
        self.emit(ConnectionEvent::StateChanged(ConnectionState::Idle));
    }

    fn emit(&self, event: ConnectionEvent) {
        self.events.send(event);
    }

    /// Forward provider events to subscribers, keeping the status current
    async fn pump(
        mut provider_rx: mpsc::Receiver<ProviderEvent>,
        status: Arc<RwLock<ConnectionStatus>>,
        events: Fanout,
    ) {
        debug!("Provider event pump started");

        while let Some(event) = provider_rx.recv().await {
            match event {
                ProviderEvent::Identity(identity) => {
                    let merged = {
                        let mut status = status.write().await;
                        let merged = merge_identity(status.call.take(), identity);
                        status.call = Some(merged.clone());
                        merged
                    };
                    events.send(ConnectionEvent::Identity(merged));
                }
                ProviderEvent::Utterance(utterance) => {
                    events.send(ConnectionEvent::Utterance(utterance));
                }
                ProviderEvent::Speech { role, active } => {
                    let (listening, speaking) = {
                        let mut status = status.write().await;
                        match role {
                            Role::Candidate => status.listening = active,
                            Role::Interviewer => status.speaking = active,
                        }
                        (status.listening, status.speaking)
                    };
                    events.send(ConnectionEvent::Activity { listening, speaking });
                }
                ProviderEvent::Error(message) => {
                    warn!("Voice provider error: {}", message);
                    {
                        let mut status = status.write().await;
                        status.state = ConnectionState::Error;
                        status.last_error = Some(message);
                    }
                    events.send(ConnectionEvent::StateChanged(ConnectionState::Error));
                }
                ProviderEvent::Ended { reason, abnormal } => {
                    info!("Call ended: {} (abnormal={})", reason, abnormal);
                    let state = {
                        let mut status = status.write().await;
                        status.state = if abnormal {
                            ConnectionState::Error
                        } else {
                            ConnectionState::Idle
                        };
                        if abnormal {
                            status.last_error = Some(reason.clone());
                        }
                        status.listening = false;
                        status.speaking = false;
                        status.state
                    };
                    events.send(ConnectionEvent::StateChanged(state));
                    events.send(ConnectionEvent::ChannelClosed { reason, abnormal });
                    return;
                }
            }
        }

        warn!("Provider channel closed without an end-of-call event");

        let reason = "channel closed unexpectedly".to_string();
        {
            let mut status = status.write().await;
            status.state = ConnectionState::Error;
            status.last_error = Some(reason.clone());
            status.listening = false;
            status.speaking = false;
        }
        events.send(ConnectionEvent::StateChanged(ConnectionState::Error));
        events.send(ConnectionEvent::ChannelClosed {
            reason,
            abnormal: true,
        });
    }
}

/// Both event paths of a manager
#[derive(Clone)]
struct Fanout {
    /// Slow receivers lose the oldest events
    observers: broadcast::Sender<ConnectionEvent>,

    /// Lossless feed for the owner of the call, see `with_events`
    owner: Option<mpsc::UnboundedSender<ConnectionEvent>>,
}

impl Fanout {
    fn send(&self, event: ConnectionEvent) {
        if let Some(owner) = &self.owner {
            if owner.send(event.clone()).is_err() {
                debug!("Event owner has gone away");
            }
        }
        // No observers is fine
        let _ = self.observers.send(event);
    }
}

/// A call reference, once known, is never dropped by a later identity event
fn merge_identity(current: Option<CallIdentity>, incoming: CallIdentity) -> CallIdentity {
    match current {
        Some(current) => CallIdentity {
            session_ref: current.session_ref,
            call_ref: current.call_ref.or(incoming.call_ref),
        },
        None => incoming,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    /// Provider whose connect waits for the test to release it
    struct GatedProvider {
        gate: Arc<Notify>,
        disconnects: Arc<AtomicUsize>,
        sender: Option<mpsc::Sender<ProviderEvent>>,
    }

    #[async_trait::async_trait]
    impl VoiceProvider for GatedProvider {
        async fn initialize(&mut self, _credentials: &ProviderCredentials) -> Result<(), InitializationError> {
            Ok(())
        }

        async fn connect(&mut self) -> Result<mpsc::Receiver<ProviderEvent>, ConnectionError> {
            self.gate.notified().await;
            let (tx, rx) = mpsc::channel(8);
            self.sender = Some(tx);
            Ok(rx)
        }

        async fn disconnect(&mut self) -> Result<(), ConnectionError> {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            self.sender = None;
            Ok(())
        }

        fn name(&self) -> &str {
            "gated"
        }
    }

    fn provider_config() -> ProviderConfig {
        ProviderConfig {
            public_key: Some("pk".to_string()),
            assistant_id: Some("asst".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_disconnect_while_connecting_cancels_the_connect() {
        let gate = Arc::new(Notify::new());
        let disconnects = Arc::new(AtomicUsize::new(0));
        let manager = Arc::new(ConnectionManager::new(
            Box::new(GatedProvider {
                gate: Arc::clone(&gate),
                disconnects: Arc::clone(&disconnects),
                sender: None,
            }),
            provider_config(),
            8,
        ));
        manager.initialize().await.unwrap();

        let connecting = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move { manager.connect().await }
        });
        while manager.status().await.state != ConnectionState::Connecting {
            tokio::task::yield_now().await;
        }

        let disconnecting = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move { manager.disconnect().await }
        });
        while manager.disconnects.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        gate.notify_one();

        assert_eq!(connecting.await.unwrap(), Err(ConnectionError::Cancelled));
        disconnecting.await.unwrap();

        assert_eq!(manager.status().await.state, ConnectionState::Idle);
        assert!(manager.pump_handle.lock().await.is_none());
        assert!(disconnects.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_owner_feed_keeps_events_observers_lose() {
        let gate = Arc::new(Notify::new());
        gate.notify_one();
        let (manager, mut owner) = ConnectionManager::with_events(
            Box::new(GatedProvider {
                gate,
                disconnects: Arc::new(AtomicUsize::new(0)),
                sender: None,
            }),
            provider_config(),
            1,
        );
        let mut observer = manager.subscribe();

        manager.initialize().await.unwrap();
        manager.connect().await.unwrap();
        manager.disconnect().await;

        let mut owned = Vec::new();
        while let Ok(event) = owner.try_recv() {
            owned.push(event);
        }
        assert_eq!(
            owned,
            vec![
                ConnectionEvent::StateChanged(ConnectionState::Connecting),
                ConnectionEvent::StateChanged(ConnectionState::Connected),
                ConnectionEvent::StateChanged(ConnectionState::Idle),
            ]
        );

        assert!(matches!(
            observer.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(2))
        ));
    }

    #[test]
    fn test_merge_identity_keeps_first_session_ref() {
        let first = CallIdentity {
            session_ref: "sess-1".to_string(),
            call_ref: None,
        };
        let later = CallIdentity {
            session_ref: "sess-2".to_string(),
            call_ref: Some("call-9".to_string()),
        };

        let merged = merge_identity(Some(first), later);
        assert_eq!(merged.session_ref, "sess-1");
        assert_eq!(merged.call_ref.as_deref(), Some("call-9"));
    }

    #[test]
    fn test_merge_identity_never_drops_call_ref() {
        let first = CallIdentity {
            session_ref: "sess-1".to_string(),
            call_ref: Some("call-1".to_string()),
        };
        let later = CallIdentity {
            session_ref: "sess-1".to_string(),
            call_ref: None,
        };

        assert_eq!(merge_identity(Some(first), later).call_ref.as_deref(), Some("call-1"));
    }
}
