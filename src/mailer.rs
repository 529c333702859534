use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::config::MailConfig;

#[derive(Debug, Clone, Serialize)]
pub struct Sender {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutgoingMail {
    pub from: Option<Sender>,
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> anyhow::Result<()>;
}

/// Delivers through an HTTP mail relay that accepts the `OutgoingMail` JSON shape.
#[derive(Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl HttpMailer {
    pub fn new(api_url: &str, api_key: Option<&str>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.to_string(),
            api_key: api_key.map(str::to_string),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, mail: &OutgoingMail) -> anyhow::Result<()> {
        let mut req = self.client.post(&self.api_url).json(mail);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        req.send()
            .await
            .context("mail relay request")?
            .error_for_status()
            .context("mail relay response")?;
        debug!(to = %mail.to, "mail sent");
        Ok(())
    }
}

/// Used when no relay is configured; every send fails so callers can flag it.
#[derive(Clone, Default)]
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, _mail: &OutgoingMail) -> anyhow::Result<()> {
        anyhow::bail!("mail relay not configured (set MAIL_API_URL)")
    }
}

pub fn from_config(cfg: &MailConfig) -> Box<dyn Mailer> {
    match &cfg.api_url {
        Some(url) => Box::new(HttpMailer::new(url, cfg.api_key.as_deref())),
        None => Box::new(DisabledMailer),
    }
}

pub fn sender(cfg: &MailConfig) -> Option<Sender> {
    cfg.from_email.as_ref().map(|email| Sender {
        email: email.clone(),
        name: cfg.from_name.clone(),
    })
}

/// HTML body of the activation mail.
pub fn otp_mail_html(name: &str, code: &str, expires_at: &str) -> String {
    format!(
        "<p>Hello {},</p>\
         <p>Your OTP code is: <strong>{}</strong></p>\
         <p>This code will expire at <strong>{}</strong>.</p>\
         <p>If you did not request this, please ignore this email.</p>",
        html_escape::encode_text(name),
        code,
        expires_at
    )
}
