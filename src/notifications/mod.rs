//! Outbound document email.
//!
//! The core hands rendered HTML to a [`PdfRenderer`] and the result to an
//! [`EmailTransport`]. A renderer failure only drops the attachment; the
//! message is still sent.

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::{
    config::AppConfig,
    errors::ServiceError,
    services::{catalog::ClientSnapshot, delivery_notes::DeliveryNoteResponse, quotes::QuoteResponse},
};

const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";
const DEFAULT_FROM: &str = "ventas@localhost";

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("pdf render error: {0}")]
    Render(String),
    #[error("no recipient address")]
    MissingRecipient,
}

impl From<NotificationError> for ServiceError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::MissingRecipient => {
                ServiceError::ValidationError("client has no email address".to_string())
            }
            other => ServiceError::ExternalServiceError(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub attachments: Vec<EmailAttachment>,
}

#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError>;
    fn name(&self) -> &'static str;
}

#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render(&self, html: &str) -> Result<Vec<u8>, NotificationError>;
}

/// Writes messages to the log instead of delivering them.
#[derive(Debug, Default, Clone)]
pub struct LogTransport;

#[async_trait]
impl EmailTransport for LogTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            attachments = message.attachments.len(),
            "email (log transport)"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// SendGrid v3 mail send API.
pub struct SendGridTransport {
    client: Client,
    api_key: String,
    from_email: String,
    endpoint: String,
}

#[derive(Serialize)]
struct SendGridEmail {
    personalizations: Vec<Personalization>,
    from: EmailAddress,
    subject: String,
    content: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<SendGridAttachment>,
}

#[derive(Serialize)]
struct Personalization {
    to: Vec<EmailAddress>,
}

#[derive(Serialize)]
struct EmailAddress {
    email: String,
}

#[derive(Serialize)]
struct Content {
    #[serde(rename = "type")]
    content_type: String,
    value: String,
}

#[derive(Serialize)]
struct SendGridAttachment {
    content: String,
    filename: String,
    #[serde(rename = "type")]
    content_type: String,
    disposition: String,
}

impl SendGridTransport {
    pub fn new(api_key: impl Into<String>, from_email: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            from_email: from_email.into(),
            endpoint: SENDGRID_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn payload(&self, message: &EmailMessage) -> SendGridEmail {
        SendGridEmail {
            personalizations: vec![Personalization {
                to: vec![EmailAddress {
                    email: message.to.clone(),
                }],
            }],
            from: EmailAddress {
                email: self.from_email.clone(),
            },
            subject: message.subject.clone(),
            content: vec![Content {
                content_type: "text/html".to_string(),
                value: message.html.clone(),
            }],
            attachments: message
                .attachments
                .iter()
                .map(|a| SendGridAttachment {
                    content: base64::engine::general_purpose::STANDARD.encode(&a.content),
                    filename: a.filename.clone(),
                    content_type: a.content_type.clone(),
                    disposition: "attachment".to_string(),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl EmailTransport for SendGridTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.payload(message))
            .send()
            .await
            .map_err(|e| NotificationError::Transport(format!("sendgrid request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Transport(format!(
                "sendgrid responded {}: {}",
                status, body
            )));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sendgrid"
    }
}

/// Tries `primary`, then `secondary` when the first one fails.
pub struct FallbackTransport {
    primary: Arc<dyn EmailTransport>,
    secondary: Arc<dyn EmailTransport>,
}

impl FallbackTransport {
    pub fn new(primary: Arc<dyn EmailTransport>, secondary: Arc<dyn EmailTransport>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl EmailTransport for FallbackTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        match self.primary.send(message).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(
                    error = %e,
                    primary = self.primary.name(),
                    secondary = self.secondary.name(),
                    "primary email transport failed, falling back"
                );
                self.secondary.send(message).await
            }
        }
    }

    fn name(&self) -> &'static str {
        "fallback"
    }
}

/// POSTs HTML to a rendering service and returns the PDF body.
pub struct HttpPdfRenderer {
    client: Client,
    url: String,
}

impl HttpPdfRenderer {
    pub fn new(url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl PdfRenderer for HttpPdfRenderer {
    async fn render(&self, html: &str) -> Result<Vec<u8>, NotificationError> {
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "text/html; charset=utf-8")
            .body(html.to_string())
            .send()
            .await
            .map_err(|e| NotificationError::Render(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotificationError::Render(format!(
                "renderer responded {}",
                response.status()
            )));
        }
        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| NotificationError::Render(e.to_string()))
    }
}

/// Renderer used when no rendering service is configured.
#[derive(Debug, Default, Clone)]
pub struct NoPdfRenderer;

#[async_trait]
impl PdfRenderer for NoPdfRenderer {
    async fn render(&self, _html: &str) -> Result<Vec<u8>, NotificationError> {
        Err(NotificationError::Render("no pdf renderer configured".to_string()))
    }
}

/// Optional recipient override for send endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SendDocumentRequest {
    pub to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SendReport {
    pub to: String,
    pub subject: String,
    pub with_attachment: bool,
}

/// Renders quotes and delivery notes and emails them to the client.
#[derive(Clone)]
pub struct DocumentMailer {
    transport: Arc<dyn EmailTransport>,
    renderer: Arc<dyn PdfRenderer>,
}

impl DocumentMailer {
    pub fn new(transport: Arc<dyn EmailTransport>, renderer: Arc<dyn PdfRenderer>) -> Self {
        Self {
            transport,
            renderer,
        }
    }

    /// Transport and renderer chosen by `email_provider` and `pdf_renderer_url`.
    pub fn from_config(config: &AppConfig) -> Self {
        let log: Arc<dyn EmailTransport> = Arc::new(LogTransport);
        let transport: Arc<dyn EmailTransport> = match (
            config.email_provider.as_str(),
            config.sendgrid_api_key.as_deref(),
        ) {
            ("sendgrid", Some(key)) => {
                let from = config.email_from.as_deref().unwrap_or(DEFAULT_FROM);
                Arc::new(FallbackTransport::new(
                    Arc::new(SendGridTransport::new(key, from)),
                    log,
                ))
            }
            _ => log,
        };
        let renderer: Arc<dyn PdfRenderer> = match config.pdf_renderer_url.as_deref() {
            Some(url) => Arc::new(HttpPdfRenderer::new(url)),
            None => Arc::new(NoPdfRenderer),
        };
        Self::new(transport, renderer)
    }

    #[instrument(skip(self, quote), fields(code = %quote.code))]
    pub async fn send_quote(
        &self,
        quote: &QuoteResponse,
        to: Option<String>,
    ) -> Result<SendReport, ServiceError> {
        let html = render_quote_html(quote);
        let subject = format!("Cotización {}", quote.code);
        self.deliver(&quote.client, to, subject, html, &quote.code)
            .await
    }

    #[instrument(skip(self, note), fields(number = %note.number))]
    pub async fn send_delivery_note(
        &self,
        note: &DeliveryNoteResponse,
        to: Option<String>,
    ) -> Result<SendReport, ServiceError> {
        let html = render_delivery_note_html(note);
        let subject = format!("Remisión {}", note.number);
        self.deliver(&note.client, to, subject, html, &note.number)
            .await
    }

    async fn deliver(
        &self,
        client: &ClientSnapshot,
        to: Option<String>,
        subject: String,
        html: String,
        code: &str,
    ) -> Result<SendReport, ServiceError> {
        let to = to
            .or_else(|| client.email.clone())
            .filter(|addr| !addr.trim().is_empty())
            .ok_or(NotificationError::MissingRecipient)?;

        let attachments = match self.renderer.render(&html).await {
            Ok(pdf) => vec![EmailAttachment {
                filename: format!("{}.pdf", code),
                content_type: "application/pdf".to_string(),
                content: pdf,
            }],
            Err(e) => {
                warn!(error = %e, code, "pdf rendering failed, sending without attachment");
                Vec::new()
            }
        };
        let with_attachment = !attachments.is_empty();

        let message = EmailMessage {
            to: to.clone(),
            subject: subject.clone(),
            html,
            attachments,
        };
        self.transport.send(&message).await?;
        metrics::counter!("ventas.emails.sent", 1, "transport" => self.transport.name());
        info!(%to, code, with_attachment, "document emailed");

        Ok(SendReport {
            to,
            subject,
            with_attachment,
        })
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn client_block(html: &mut String, client: &ClientSnapshot) {
    let _ = write!(html, "<p><strong>{}</strong>", escape(&client.name));
    for line in [&client.address, &client.city, &client.phone, &client.email]
        .into_iter()
        .flatten()
    {
        let _ = write!(html, "<br>{}", escape(line));
    }
    html.push_str("</p>");
}

fn money(value: Decimal) -> String {
    format!("${}", value.round_dp(2))
}

pub fn render_quote_html(quote: &QuoteResponse) -> String {
    let mut html = String::new();
    let _ = write!(html, "<h1>Cotización {}</h1>", escape(&quote.code));
    client_block(&mut html, &quote.client);
    html.push_str(
        "<table><tr><th>Producto</th><th>Cantidad</th><th>Precio</th><th>Desc. %</th><th>Subtotal</th></tr>",
    );
    for item in &quote.items {
        let price = item.unit_value.or(item.unit_price).unwrap_or(Decimal::ZERO);
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&item.product_name),
            item.quantity,
            money(price),
            item.discount,
            money(item.subtotal)
        );
    }
    let _ = write!(html, "</table><p>Total: {}</p>", money(quote.total));
    if let Some(obs) = &quote.observations {
        let _ = write!(html, "<p>{}</p>", escape(obs));
    }
    html
}

pub fn render_delivery_note_html(note: &DeliveryNoteResponse) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<h1>Remisión {}</h1><p>Pedido {}</p>",
        escape(&note.number),
        escape(&note.order_code)
    );
    client_block(&mut html, &note.client);
    html.push_str(
        "<table><tr><th>Código</th><th>Producto</th><th>Cantidad</th><th>Precio</th><th>Total</th></tr>",
    );
    for item in &note.items {
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(item.code.as_deref().unwrap_or("")),
            escape(&item.name),
            item.quantity,
            money(item.unit_price),
            money(item.total)
        );
    }
    let _ = write!(
        html,
        "</table><p>Artículos: {} | Unidades: {} | Total: {}</p>",
        note.item_count,
        note.total_quantity,
        money(note.total)
    );
    if let Some(obs) = &note.observations {
        let _ = write!(html, "<p>{}</p>", escape(obs));
    }
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::quote::QuoteStatus;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct Recording {
        sent: Mutex<Vec<EmailMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl EmailTransport for Recording {
        async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
            if self.fail {
                return Err(NotificationError::Transport("down".into()));
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    struct FixedPdf;

    #[async_trait]
    impl PdfRenderer for FixedPdf {
        async fn render(&self, _html: &str) -> Result<Vec<u8>, NotificationError> {
            Ok(b"%PDF-1.4".to_vec())
        }
    }

    fn quote(email: Option<&str>) -> QuoteResponse {
        QuoteResponse {
            id: Uuid::new_v4(),
            code: "COT-AB12".into(),
            client_id: None,
            client: ClientSnapshot {
                name: "Ferretería <Central>".into(),
                email: email.map(str::to_string),
                ..Default::default()
            },
            responsible_id: None,
            status: QuoteStatus::Activa,
            order_id: None,
            total: dec!(100),
            observations: None,
            items: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn renderer_failure_still_sends_without_attachment() {
        let transport = Arc::new(Recording::default());
        let mailer = DocumentMailer::new(transport.clone(), Arc::new(NoPdfRenderer));

        let report = mailer
            .send_quote(&quote(Some("compras@ferreteria.test")), None)
            .await
            .unwrap();

        assert!(!report.with_attachment);
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].attachments.is_empty());
        assert!(sent[0].html.contains("Ferretería &lt;Central&gt;"));
    }

    #[tokio::test]
    async fn rendered_pdf_is_attached() {
        let transport = Arc::new(Recording::default());
        let mailer = DocumentMailer::new(transport.clone(), Arc::new(FixedPdf));

        let report = mailer
            .send_quote(&quote(None), Some("otro@cliente.test".into()))
            .await
            .unwrap();

        assert_eq!(report.to, "otro@cliente.test");
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].attachments[0].filename, "COT-AB12.pdf");
    }

    #[tokio::test]
    async fn missing_recipient_is_a_validation_error() {
        let mailer = DocumentMailer::new(Arc::new(LogTransport), Arc::new(NoPdfRenderer));
        let err = mailer.send_quote(&quote(None), None).await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn fallback_uses_secondary_on_failure() {
        let primary = Arc::new(Recording {
            fail: true,
            ..Default::default()
        });
        let secondary = Arc::new(Recording::default());
        let transport = FallbackTransport::new(primary, secondary.clone());

        let message = EmailMessage {
            to: "a@b.test".into(),
            subject: "s".into(),
            html: String::new(),
            attachments: Vec::new(),
        };
        transport.send(&message).await.unwrap();
        assert_eq!(secondary.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn sendgrid_payload_base64_encodes_attachments() {
        let transport = SendGridTransport::new("key", "ventas@empresa.test");
        let payload = transport.payload(&EmailMessage {
            to: "a@b.test".into(),
            subject: "s".into(),
            html: "<p>x</p>".into(),
            attachments: vec![EmailAttachment {
                filename: "REM-00001.pdf".into(),
                content_type: "application/pdf".into(),
                content: b"pdf".to_vec(),
            }],
        });
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["attachments"][0]["content"], "cGRm");
        assert_eq!(json["from"]["email"], "ventas@empresa.test");
    }
}
