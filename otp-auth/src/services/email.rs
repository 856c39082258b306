// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use crate::services::logging::anonymize_email;
use anyhow::{Context, Result};
use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use std::env;
use std::future::Future;

/// Delivers one-time passcodes to users.
pub trait OtpMailer: Send + Sync + 'static {
    fn send_otp(
        &self,
        to_email: &str,
        code: &str,
        expiry_minutes: u64,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Configuration for the email service.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub smtp_tls: bool,
    pub from_email: String,
    pub from_name: String,
}

impl EmailConfig {
    /// Load email configuration from environment variables.
    /// Returns `None` when `SMTP_HOST` is not set.
    pub fn from_env() -> Result<Option<Self>> {
        let Ok(smtp_host) = env::var("SMTP_HOST") else {
            return Ok(None);
        };

        Ok(Some(Self {
            smtp_host,
            smtp_port: env::var("SMTP_PORT")
                .unwrap_or_else(|_| "587".to_string())
                .parse()
                .context("SMTP_PORT must be a valid port number")?,
            smtp_username: env::var("SMTP_USERNAME").context("SMTP_USERNAME must be set")?,
            smtp_password: env::var("SMTP_PASSWORD").context("SMTP_PASSWORD must be set")?,
            smtp_tls: env::var("SMTP_TLS").map(|v| v == "true").unwrap_or(true),
            from_email: env::var("SMTP_FROM_EMAIL").context("SMTP_FROM_EMAIL must be set")?,
            from_name: env::var("SMTP_FROM_NAME").unwrap_or_else(|_| "otp-auth".to_string()),
        }))
    }
}

/// Email template with simple variable substitution.
struct EmailTemplate {
    content: &'static str,
}

impl EmailTemplate {
    const fn new(content: &'static str) -> Self {
        Self { content }
    }

    fn render(&self, vars: &[(&str, &str)]) -> String {
        let mut result = self.content.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }
}

const OTP_CODE_TEMPLATE: EmailTemplate =
    EmailTemplate::new(include_str!("../../templates/emails/otp_code.txt"));

fn render_otp_body(code: &str, expiry_minutes: u64) -> String {
    let expiry_minutes = expiry_minutes.to_string();
    OTP_CODE_TEMPLATE.render(&[("code", code), ("expiry_minutes", &expiry_minutes)])
}

/// SMTP email service.
pub struct EmailService {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_mailbox: Mailbox,
}

impl EmailService {
    /// Create a new email service with the given configuration.
    pub fn new(config: EmailConfig) -> Result<Self> {
        let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());

        let transport = if config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
                .context("Failed to create SMTP relay")?
                .port(config.smtp_port)
                .credentials(creds)
                .build()
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
                .port(config.smtp_port)
                .credentials(creds)
                .build()
        };

        let from_mailbox: Mailbox = format!("{} <{}>", config.from_name, config.from_email)
            .parse()
            .context("Invalid from email address")?;

        Ok(Self {
            transport,
            from_mailbox,
        })
    }

    /// Send an email.
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let to_mailbox: Mailbox = to.parse().context("Invalid recipient email address")?;

        let email = Message::builder()
            .from(self.from_mailbox.clone())
            .to(to_mailbox)
            .subject(subject)
            .body(body.to_string())
            .context("Failed to build email message")?;

        self.transport
            .send(email)
            .await
            .context("Failed to send email")?;

        Ok(())
    }
}

impl OtpMailer for EmailService {
    async fn send_otp(&self, to_email: &str, code: &str, expiry_minutes: u64) -> Result<()> {
        let body = render_otp_body(code, expiry_minutes);
        self.send_email(to_email, "Your sign-in code", &body).await
    }
}

/// Writes passcodes to the log instead of sending them. Local development only.
pub struct LogMailer;

impl OtpMailer for LogMailer {
    async fn send_otp(&self, to_email: &str, code: &str, expiry_minutes: u64) -> Result<()> {
        tracing::warn!(
            email = %anonymize_email(to_email),
            code,
            expiry_minutes,
            "SMTP not configured, passcode written to log"
        );
        Ok(())
    }
}

/// Mailer selected at startup.
pub enum Mailer {
    Smtp(EmailService),
    Log(LogMailer),
}

impl Mailer {
    /// SMTP when `SMTP_HOST` is configured, log otherwise.
    pub fn from_env() -> Result<Self> {
        match EmailConfig::from_env()? {
            Some(config) => Ok(Mailer::Smtp(EmailService::new(config)?)),
            None => Ok(Mailer::Log(LogMailer)),
        }
    }
}

impl OtpMailer for Mailer {
    async fn send_otp(&self, to_email: &str, code: &str, expiry_minutes: u64) -> Result<()> {
        match self {
            Mailer::Smtp(service) => service.send_otp(to_email, code, expiry_minutes).await,
            Mailer::Log(log) => log.send_otp(to_email, code, expiry_minutes).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_render() {
        let template = EmailTemplate::new("Hello {{name}}, your code is {{code}}.");
        let result = template.render(&[("name", "Alice"), ("code", "12345")]);
        assert_eq!(result, "Hello Alice, your code is 12345.");
    }

    #[test]
    fn test_template_render_missing_var() {
        let template = EmailTemplate::new("Hello {{name}}, welcome!");
        let result = template.render(&[]);
        assert_eq!(result, "Hello {{name}}, welcome!");
    }

    #[test]
    fn test_otp_template_loads() {
        let result = render_otp_body("042917", 10);
        assert!(result.contains("042917"));
        assert!(result.contains("10 minutes"));
        assert!(!result.contains("{{"));
    }

    #[tokio::test]
    async fn test_log_mailer_always_succeeds() {
        assert!(LogMailer
            .send_otp("alice@example.com", "123456", 10)
            .await
            .is_ok());
    }
}
