/// Outbound email: SMTP transport, templates, and detached dispatch.
///
/// Delivery is best-effort. `EmailDispatcher` launches every send as an
/// independent task bounded by a timeout; failures are logged and never reach
/// the request that triggered them.
use crate::config::EmailSettings;
use crate::error::{AccountError, Result};
use crate::models::OtpPurpose;
use async_trait::async_trait;
use lettre::message::{header, Mailbox, Message, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// `alice@example.com` -> `a***@example.com`
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let first = local.chars().next().unwrap_or('*');
            format!("{first}***@{domain}")
        }
        None => "***".to_string(),
    }
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, html_body: &str) -> Result<()>;
}

/// Async SMTP transport wrapper (SMTP or no-op)
#[derive(Clone)]
pub struct SmtpEmailSender {
    transport: Option<Arc<AsyncSmtpTransport<Tokio1Executor>>>,
    from: Mailbox,
}

impl SmtpEmailSender {
    /// If SMTP host is empty, operates in no-op mode (logs only).
    pub fn new(config: &EmailSettings) -> Result<Self> {
        let from = config
            .smtp_from
            .parse::<Mailbox>()
            .map_err(|e| AccountError::Internal(format!("Invalid SMTP_FROM address: {}", e)))?;

        let transport = if config.smtp_host.trim().is_empty() {
            warn!("SMTP host not configured; email sender will operate in no-op mode");
            None
        } else {
            let builder = if config.use_starttls {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            } else {
                AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            }
            .map_err(|e| {
                AccountError::Internal(format!("Failed to configure SMTP transport: {}", e))
            })?
            .port(config.smtp_port);

            let builder = if let (Some(username), Some(password)) =
                (&config.smtp_username, &config.smtp_password)
            {
                builder.credentials(Credentials::new(username.to_string(), password.to_string()))
            } else {
                builder
            };

            Some(Arc::new(builder.build()))
        };

        Ok(Self { transport, from })
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, recipient: &str, subject: &str, html_body: &str) -> Result<()> {
        let Some(transport) = &self.transport else {
            info!(
                subject,
                recipient = %mask_email(recipient),
                "Email sender running in no-op mode; skipping actual send"
            );
            return Ok(());
        };

        let to = recipient.parse::<Mailbox>().map_err(|e| {
            AccountError::Internal(format!("Invalid recipient email address: {}", e))
        })?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(strip_tags(html_body)),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )
            .map_err(|e| AccountError::Internal(format!("Failed to build email message: {}", e)))?;

        transport
            .send(email)
            .await
            .map_err(|e| AccountError::Internal(format!("Failed to send email: {}", e)))?;
        info!(subject, "email sent successfully");
        Ok(())
    }
}

/// Plain-text fallback for the HTML templates below
fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// A message captured by [`RecordingEmailSender`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub recipient: String,
    pub subject: String,
    pub html_body: String,
}

/// Sender that keeps messages in memory; optionally fails every send.
#[derive(Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<SentEmail>>,
    fail: bool,
}

impl RecordingEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn messages(&self) -> Vec<SentEmail> {
        self.sent.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn messages_to(&self, recipient: &str) -> Vec<SentEmail> {
        self.messages()
            .into_iter()
            .filter(|m| m.recipient == recipient)
            .collect()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, recipient: &str, subject: &str, html_body: &str) -> Result<()> {
        if self.fail {
            return Err(AccountError::Internal("smtp relay unavailable".to_string()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentEmail {
                recipient: recipient.to_string(),
                subject: subject.to_string(),
                html_body: html_body.to_string(),
            });
        }
        Ok(())
    }
}

/// Renders templates and launches sends as detached tasks
#[derive(Clone)]
pub struct EmailDispatcher {
    sender: Arc<dyn EmailSender>,
    send_timeout: Duration,
    client_origin: String,
}

impl EmailDispatcher {
    pub fn new(sender: Arc<dyn EmailSender>, send_timeout: Duration, client_origin: &str) -> Self {
        Self {
            sender,
            send_timeout,
            client_origin: client_origin.trim_end_matches('/').to_string(),
        }
    }

    /// Fire-and-forget send. The handle is returned for callers that want to
    /// await completion (tests); request paths drop it.
    pub fn dispatch(&self, recipient: &str, subject: &str, html_body: String) -> JoinHandle<()> {
        let sender = self.sender.clone();
        let send_timeout = self.send_timeout;
        let recipient = recipient.to_string();
        let subject = subject.to_string();

        tokio::spawn(async move {
            let masked = mask_email(&recipient);
            match tokio::time::timeout(send_timeout, sender.send(&recipient, &subject, &html_body))
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(recipient = %masked, subject = %subject, error = %e, "email delivery failed");
                }
                Err(_) => {
                    error!(
                        recipient = %masked,
                        subject = %subject,
                        timeout_secs = send_timeout.as_secs(),
                        "email delivery timed out"
                    );
                }
            }
        })
    }

    pub fn verification_link(&self, code: &str) -> String {
        format!("{}/verify-email/{}", self.client_origin, code)
    }

    pub fn send_verification(&self, recipient: &str, username: &str, code: &str) -> JoinHandle<()> {
        let link = self.verification_link(code);
        let html = format!(
            r#"<!DOCTYPE html>
<html>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; padding: 20px; color: #333;">
    <h2>Welcome, {username}!</h2>
    <p>Please confirm your email address to activate your account.</p>
    <p style="margin: 30px 0;">
        <a href="{link}" style="background-color: #000; color: #fff; padding: 14px 28px; text-decoration: none; border-radius: 25px;">Verify email</a>
    </p>
    <p style="color: #999; font-size: 12px;">If you did not create an account, please ignore this email.</p>
</body>
</html>"#
        );
        self.dispatch(recipient, "Your account verification code", html)
    }

    pub fn send_otp(
        &self,
        recipient: &str,
        code: &str,
        purpose: OtpPurpose,
        valid_for: Duration,
    ) -> JoinHandle<()> {
        let (subject, action) = match purpose {
            OtpPurpose::PasswordReset => ("Your password reset code", "reset your password"),
            OtpPurpose::AccountDeletion => ("Your account deletion code", "delete your account"),
        };
        let hours = (valid_for.as_secs() / 3600).max(1);
        let html = format!(
            r#"<!DOCTYPE html>
<html>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; padding: 20px; color: #333;">
    <p>Use the code below to {action}:</p>
    <p style="font-size: 28px; letter-spacing: 6px;"><strong>{code}</strong></p>
    <p style="color: #999; font-size: 12px;">The code expires in {hours} hour(s). If you did not request it, please ignore this email.</p>
</body>
</html>"#
        );
        self.dispatch(recipient, subject, html)
    }
}
