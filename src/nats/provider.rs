use super::client::NatsClient;
use super::messages::{CallEventMessage, StartCallRequest};
use crate::connection::{ProviderCredentials, ProviderEvent, ProviderFactory, VoiceProvider};
use crate::error::{ConnectionError, InitializationError};
use chrono::Utc;
use futures::stream::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Voice provider reached through a NATS gateway
pub struct NatsVoiceProvider {
    url: String,
    event_buffer: usize,
    client: Option<Arc<NatsClient>>,
    credentials: Option<ProviderCredentials>,
    call_key: Option<String>,
    forward_task: Option<JoinHandle<()>>,
}

impl NatsVoiceProvider {
    pub fn new(url: impl Into<String>, event_buffer: usize) -> Self {
        Self {
            url: url.into(),
            event_buffer: event_buffer.max(1),
            client: None,
            credentials: None,
            call_key: None,
            forward_task: None,
        }
    }
}

#[async_trait::async_trait]
impl VoiceProvider for NatsVoiceProvider {
    async fn initialize(&mut self, credentials: &ProviderCredentials) -> Result<(), InitializationError> {
        let client = NatsClient::connect(&self.url)
            .await
            .map_err(|e| InitializationError::Provider(format!("{:#}", e)))?;

        self.client = Some(Arc::new(client));
        self.credentials = Some(credentials.clone());

        Ok(())
    }

    async fn connect(&mut self) -> Result<mpsc::Receiver<ProviderEvent>, ConnectionError> {
        let (client, credentials) = match (&self.client, &self.credentials) {
            (Some(client), Some(credentials)) => (Arc::clone(client), credentials.clone()),
            _ => return Err(ConnectionError::NotInitialized),
        };

        let call_key = uuid::Uuid::new_v4().to_string();

        // Subscribe first so no event published right after acceptance is missed
        let mut subscriber = client
            .subscribe_call_events(&call_key)
            .await
            .map_err(|e| ConnectionError::Transport(format!("{:#}", e)))?;

        let reply = client
            .start_call(&StartCallRequest {
                call_key: call_key.clone(),
                public_key: credentials.public_key,
                assistant_id: credentials.assistant_id,
            })
            .await
            .map_err(|e| ConnectionError::Transport(format!("{:#}", e)))?;

        if !reply.accepted {
            return Err(ConnectionError::Rejected(
                reply.error.unwrap_or_else(|| "no reason given".to_string()),
            ));
        }

        info!("Call {} accepted", call_key);

        let (tx, rx) = mpsc::channel(self.event_buffer);

        let forward_task = tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                let message = match serde_json::from_slice::<CallEventMessage>(&msg.payload) {
                    Ok(message) => message,
                    Err(e) => {
                        warn!("Failed to parse call event: {}", e);
                        continue;
                    }
                };

                let Some(event) = message.into_provider_event(Utc::now()) else {
                    continue;
                };

                let ended = matches!(event, ProviderEvent::Ended { .. });

                if tx.send(event).await.is_err() {
                    debug!("Call event receiver dropped");
                    break;
                }

                if ended {
                    break;
                }
            }

            debug!("Call event forwarding stopped");
        });

        self.call_key = Some(call_key);
        self.forward_task = Some(forward_task);

        Ok(rx)
    }

    async fn disconnect(&mut self) -> Result<(), ConnectionError> {
        if let Some(task) = self.forward_task.take() {
            task.abort();
        }

        let Some(call_key) = self.call_key.take() else {
            return Ok(());
        };

        match &self.client {
            Some(client) => client
                .stop_call(&call_key)
                .await
                .map_err(|e| ConnectionError::Transport(format!("{:#}", e))),
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "nats"
    }
}

/// Creates one NATS provider per interview
pub struct NatsProviderFactory {
    pub url: String,
    pub event_buffer: usize,
}

impl ProviderFactory for NatsProviderFactory {
    fn create(&self) -> Box<dyn VoiceProvider> {
        Box::new(NatsVoiceProvider::new(self.url.clone(), self.event_buffer))
    }
}
