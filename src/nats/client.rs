use super::messages::{StartCallReply, StartCallRequest};
use anyhow::{Context, Result};
use async_nats::Client;
use tracing::info;

pub const START_CALL_SUBJECT: &str = "voice.calls.start";

pub fn call_events_subject(call_key: &str) -> String {
    format!("voice.call.{}.events", call_key)
}

pub fn call_stop_subject(call_key: &str) -> String {
    format!("voice.call.{}.stop", call_key)
}

pub struct NatsClient {
    client: Client,
}

impl NatsClient {
    /// Connect to NATS server
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self { client })
    }

    /// Ask the provider gateway to start a call
    pub async fn start_call(&self, request: &StartCallRequest) -> Result<StartCallReply> {
        let payload = serde_json::to_vec(request)?;

        let reply = self
            .client
            .request(START_CALL_SUBJECT.to_string(), payload.into())
            .await
            .context("Start-call request failed")?;

        serde_json::from_slice(&reply.payload).context("Malformed start-call reply")
    }

    /// Subscribe to events for one call
    pub async fn subscribe_call_events(&self, call_key: &str) -> Result<async_nats::Subscriber> {
        let subject = call_events_subject(call_key);

        info!("Subscribing to call events on {}", subject);

        let subscriber = self
            .client
            .subscribe(subject)
            .await
            .context("Failed to subscribe to call events")?;

        Ok(subscriber)
    }

    /// Ask the provider gateway to hang up
    pub async fn stop_call(&self, call_key: &str) -> Result<()> {
        let subject = call_stop_subject(call_key);

        self.client
            .publish(subject.clone(), Vec::<u8>::new().into())
            .await
            .context("Failed to publish stop request")?;

        self.client.flush().await.context("Failed to flush stop request")?;

        info!("Published stop request to {}", subject);

        Ok(())
    }
}
