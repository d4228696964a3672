use std::collections::HashMap;

use futures::future::BoxFuture;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("push transport not configured")]
    Unconfigured,

    #[error("push transport rejected message: {0}")]
    Transport(String),
}

/// One outbound push message. `data` is the flat string-only metadata map
/// the channel accepts; typed context is flattened before it gets here.
#[derive(Debug, Clone)]
pub struct PushMessage {
    pub token: String,
    pub title: String,
    pub body: String,
    pub data: HashMap<String, String>,
}

/// Delivery capability for the push channel. The production transport is an
/// external collaborator; anything implementing this trait can be injected.
pub trait PushSender: Send + Sync {
    fn send(&self, message: PushMessage) -> BoxFuture<'static, Result<(), PushError>>;

    fn send_batch(
        &self,
        tokens: Vec<String>,
        title: String,
        body: String,
        data: HashMap<String, String>,
    ) -> BoxFuture<'static, Vec<(String, Result<(), PushError>)>>;
}

/// Stand-in sender used when no push transport is configured: logs each
/// message and reports success so the triggering operation is unaffected.
pub struct LogSender;

impl PushSender for LogSender {
    fn send(&self, message: PushMessage) -> BoxFuture<'static, Result<(), PushError>> {
        Box::pin(async move {
            debug!(
                token = %message.token,
                title = %message.title,
                "push transport not configured; message logged"
            );
            Ok(())
        })
    }

    fn send_batch(
        &self,
        tokens: Vec<String>,
        title: String,
        _body: String,
        _data: HashMap<String, String>,
    ) -> BoxFuture<'static, Vec<(String, Result<(), PushError>)>> {
        Box::pin(async move {
            debug!(
                recipients = tokens.len(),
                title = %title,
                "push transport not configured; batch logged"
            );
            tokens.into_iter().map(|token| (token, Ok(()))).collect()
        })
    }
}
