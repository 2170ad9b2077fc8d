use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use crate::config::SmtpConfig;

const RESET_SUBJECT: &str = "Your Password Reset Code";

#[async_trait]
pub trait ResetCodeSender: Send + Sync {
    async fn send_password_reset_code(&self, to_email: &str, code: &str) -> anyhow::Result<()>;
}

pub fn reset_code_body(code: &str) -> String {
    format!(
        "Your 6-digit password reset code is: {code}. This code will expire in 15 minutes. \
         Please use it immediately to reset your password."
    )
}

/// SMTP relay with STARTTLS and PLAIN credentials.
#[derive(Clone)]
pub struct SmtpSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpSender {
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let from = cfg
            .from
            .parse::<Mailbox>()
            .with_context(|| format!("FROM_EMAIL {:?} is not a valid address", cfg.from))?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
            .context("configure smtp relay")?
            .port(cfg.port)
            .credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()))
            .build();
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl ResetCodeSender for SmtpSender {
    async fn send_password_reset_code(&self, to_email: &str, code: &str) -> anyhow::Result<()> {
        let to = to_email
            .parse::<Mailbox>()
            .context("parse recipient address")?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(RESET_SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(reset_code_body(code))
            .context("build reset email")?;

        self.transport.send(message).await.context("smtp send")?;
        info!(to = %to_email, "password reset code sent");
        Ok(())
    }
}
