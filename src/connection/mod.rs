//! Live voice channel management
//!
//! `ConnectionManager` owns one call to the voice provider: it validates
//! credentials, opens and tears down the channel, tracks the observable
//! connection state and fans provider events out to subscribers.
//! The transport itself sits behind the `VoiceProvider` trait.

mod manager;
mod provider;

pub use manager::{ConnectionEvent, ConnectionManager, ConnectionState, ConnectionStatus};
pub use provider::{CallIdentity, ProviderCredentials, ProviderEvent, ProviderFactory, VoiceProvider};
