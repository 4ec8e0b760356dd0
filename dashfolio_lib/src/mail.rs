//! Email delivery of the rendered dashboard over SMTP with XOAUTH2.

use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::retry::Retryable;

/// File name of the per-asset report attachment.
pub const ATTACHMENT_NAME: &str = "portfolio_with_kpis.html";

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Invalid email address {address}: {reason}")]
    Address { address: String, reason: String },
    #[error("Failed to build email: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

impl Retryable for MailError {
    fn is_retryable(&self) -> bool {
        match self {
            // 4xx replies, timeouts and connection failures.
            Self::Smtp(e) => {
                e.is_transient() || e.is_timeout() || !(e.is_permanent() || e.is_client() || e.is_response())
            }
            Self::Address { .. } | Self::Build(_) => false,
        }
    }
}

/// SMTP relay settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
}

/// The three rendered HTML reports of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReport {
    pub date: String,
    pub summary_html: String,
    pub per_asset_html: String,
    pub indirect_html: String,
}

impl RenderedReport {
    pub fn subject(&self) -> String {
        format!("{} portfolio dashboard", self.date)
    }

    /// Greeting followed by the summary and indirect-position tables.
    pub fn body_html(&self) -> String {
        format!(
            "Hi,<br>Here is your daily portfolio dashboard for {}. <br> {} <br> {}",
            self.date, self.summary_html, self.indirect_html
        )
    }
}

fn mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse().map_err(|e: lettre::address::AddressError| MailError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

/// Builds the dashboard email: HTML body plus the per-asset report attached.
pub fn build_message(sender: &str, receiver: &str, report: &RenderedReport) -> Result<Message, MailError> {
    let attachment = Attachment::new(ATTACHMENT_NAME.to_string())
        .body(report.per_asset_html.clone(), ContentType::TEXT_HTML);
    let message = Message::builder()
        .from(mailbox(sender)?)
        .to(mailbox(receiver)?)
        .subject(report.subject())
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::html(report.body_html()))
                .singlepart(attachment),
        )?;
    Ok(message)
}

/// Sends `message` through a STARTTLS relay, authenticating as `sender`
/// with the OAuth access token.
pub async fn send_message(
    message: Message,
    smtp: &SmtpSettings,
    sender: &str,
    access_token: &str,
) -> Result<(), MailError> {
    let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.server)?
        .port(smtp.port)
        .credentials(Credentials::new(sender.to_string(), access_token.to_string()))
        .authentication(vec![Mechanism::Xoauth2])
        .timeout(Some(SMTP_TIMEOUT))
        .build();
    tracing::info!("Sending dashboard email via {}:{}", smtp.server, smtp.port);
    mailer.send(message).await?;
    Ok(())
}
