//! SMTP mail transport (async lettre, STARTTLS).
//!
//! Works with Gmail app passwords, Outlook and any custom relay. Verified
//! alternate identities and the signature come from `[smtp]` in the config,
//! since plain SMTP has no way to query them.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use sheetmail_core::config::SmtpConfig;
use sheetmail_core::{MailTransport, OutgoingEmail, Result, SenderIdentity, SheetmailError};

pub struct SmtpTransport {
    config: SmtpConfig,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpTransport {
    /// Build the relay once; the connection pool is reused across sends.
    pub fn new(config: SmtpConfig) -> Result<Self> {
        if config.primary_address().is_empty() {
            return Err(SheetmailError::Config(
                "smtp.username or smtp.from_address must be set".into(),
            ));
        }
        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| SheetmailError::Transport(format!("SMTP relay: {e}")))?
            .port(config.port)
            .credentials(creds)
            .build();
        Ok(Self { config, mailer })
    }

    pub async fn test_connection(&self) -> Result<bool> {
        self.mailer
            .test_connection()
            .await
            .map_err(|e| SheetmailError::Transport(format!("SMTP connect: {e}")))
    }
}

fn mailbox(identity: &SenderIdentity) -> Result<Mailbox> {
    let address: Address = identity
        .address
        .trim()
        .parse()
        .map_err(|e| SheetmailError::Transport(format!("Invalid address '{}': {e}", identity.address)))?;
    Ok(Mailbox::new(identity.display_name.clone(), address))
}

/// Turn an [`OutgoingEmail`] into a lettre message.
pub fn build_message(email: &OutgoingEmail) -> Result<Message> {
    let to: Mailbox = email
        .to
        .parse()
        .map_err(|e| SheetmailError::Transport(format!("Invalid to: {e}")))?;

    let builder = Message::builder()
        .from(mailbox(&email.from)?)
        .to(to)
        .subject(email.subject.as_str());

    if email.body_html.is_none() && email.attachments.is_empty() {
        return builder
            .header(ContentType::TEXT_PLAIN)
            .body(email.body_text.clone())
            .map_err(|e| SheetmailError::Transport(format!("Build email: {e}")));
    }

    let mut body = match &email.body_html {
        Some(html) => {
            let alternative = MultiPart::alternative_plain_html(email.body_text.clone(), html.clone());
            if email.attachments.is_empty() {
                alternative
            } else {
                MultiPart::mixed().multipart(alternative)
            }
        }
        None => MultiPart::mixed().singlepart(SinglePart::plain(email.body_text.clone())),
    };
    for blob in &email.attachments {
        let content_type = ContentType::parse(&blob.mime_type)
            .map_err(|e| SheetmailError::Transport(format!("Bad MIME type '{}': {e}", blob.mime_type)))?;
        body = body.singlepart(Attachment::new(blob.filename.clone()).body(blob.data.to_vec(), content_type));
    }

    builder
        .multipart(body)
        .map_err(|e| SheetmailError::Transport(format!("Build email: {e}")))
}

#[async_trait]
impl MailTransport for SmtpTransport {
    fn name(&self) -> &str {
        "smtp"
    }

    fn primary_identity(&self) -> SenderIdentity {
        SenderIdentity {
            address: self.config.primary_address().to_string(),
            display_name: self.config.display_name.clone(),
            is_primary: true,
        }
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let message = build_message(email)?;
        self.mailer
            .send(message)
            .await
            .map_err(|e| SheetmailError::Transport(format!("SMTP send: {e}")))?;
        Ok(())
    }

    async fn send_as_identities(&self) -> Result<Vec<SenderIdentity>> {
        Ok(self.config.send_as.clone())
    }

    async fn signature_html(&self) -> Result<Option<String>> {
        Ok(self.config.signature_html.clone().filter(|s| !s.trim().is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetmail_core::AttachmentBlob;
    use std::sync::Arc;

    fn email() -> OutgoingEmail {
        OutgoingEmail {
            to: "ann@example.com".into(),
            from: SenderIdentity::new("me@example.com").named("Shop Team"),
            subject: "Hi Ann".into(),
            body_text: "Hello".into(),
            body_html: None,
            attachments: Vec::new(),
        }
    }

    fn formatted(m: &Message) -> String {
        String::from_utf8_lossy(&m.formatted()).into_owned()
    }

    #[test]
    fn test_plain_message() {
        let raw = formatted(&build_message(&email()).unwrap());
        assert!(raw.contains("From: \"Shop Team\" <me@example.com>") || raw.contains("From: Shop Team <me@example.com>"));
        assert!(raw.contains("To: ann@example.com"));
        assert!(raw.contains("Subject: Hi Ann"));
        assert!(raw.contains("text/plain"));
    }

    #[test]
    fn test_html_and_attachment() {
        let mut e = email();
        e.body_html = Some("<p>Hello</p>".into());
        e.attachments.push(AttachmentBlob {
            filename: "menu.pdf".into(),
            mime_type: "application/pdf".into(),
            data: Arc::from(b"%PDF-1.4".to_vec()),
        });
        let raw = formatted(&build_message(&e).unwrap());
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/html"));
        assert!(raw.contains("application/pdf"));
        assert!(raw.contains("menu.pdf"));
    }

    #[test]
    fn test_bad_recipient_is_transport_error() {
        let mut e = email();
        e.to = "not an address".into();
        assert!(matches!(build_message(&e), Err(SheetmailError::Transport(_))));
    }

    #[tokio::test]
    async fn test_identities_from_config() {
        let cfg = SmtpConfig {
            username: "me@example.com".into(),
            display_name: Some("Me".into()),
            send_as: vec![SenderIdentity::new("sales@example.com")],
            signature_html: Some("  ".into()),
            ..SmtpConfig::default()
        };
        let t = SmtpTransport::new(cfg).unwrap();
        assert_eq!(t.primary_identity().mailbox(), "Me <me@example.com>");
        assert!(t.primary_identity().is_primary);
        assert_eq!(t.send_as_identities().await.unwrap().len(), 1);
        assert_eq!(t.signature_html().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_requires_an_address() {
        assert!(matches!(SmtpTransport::new(SmtpConfig::default()), Err(SheetmailError::Config(_))));
    }
}
