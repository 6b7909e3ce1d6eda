use async_trait::async_trait;
use tracing::info;

use crate::domain::error::DomainError;

#[derive(Debug, Clone)]
pub(crate) struct OutgoingMail {
    pub(crate) to: String,
    pub(crate) subject: String,
    pub(crate) body: String,
}

#[async_trait]
pub(crate) trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), DomainError>;
}

/// Writes outgoing mail to the log instead of delivering it.
#[derive(Debug, Clone, Default)]
pub(crate) struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), DomainError> {
        info!(to = %mail.to, subject = %mail.subject, body = %mail.body, "outgoing mail");
        Ok(())
    }
}
