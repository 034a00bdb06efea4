//! Order emails over SMTP.
//!
//! Uses lettre for delivery with Askama HTML and plain-text templates. When
//! no SMTP credentials are configured, messages go to a stub transport that
//! accepts and logs them.

use std::future::Future;

use askama::Template;
use chrono::{DateTime, Utc};
use lettre::{
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
    transport::stub::{AsyncStubTransport, Error as StubError},
};
use secrecy::ExposeSecret;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::EmailConfig;
use crate::models::Order;

/// Sender used when no SMTP account is configured.
const FALLBACK_SENDER: &str = "no-reply@localhost";

const ORDER_SYSTEM_NAME: &str = "QuardCubeLabs Order System";
const SHOP_NAME: &str = "QuardCubeLabs";

/// HTML template for the new-order notification sent to the shop.
#[derive(Template)]
#[template(path = "email/order_notification.html")]
struct OrderNotificationHtml<'a> {
    order: &'a Order,
}

/// Plain text template for the new-order notification.
#[derive(Template)]
#[template(path = "email/order_notification.txt")]
struct OrderNotificationText<'a> {
    order: &'a Order,
}

/// HTML template for the customer's order confirmation.
#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    order: &'a Order,
}

/// Plain text template for the customer's order confirmation.
#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    order: &'a Order,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Stub transport error.
    #[error("stub transport error: {0}")]
    Stub(#[from] StubError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// A rendered email ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from_name: &'static str,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// New-order notification for the shop inbox.
///
/// # Errors
///
/// Returns `EmailError::Template` if rendering fails.
pub fn order_notification(order: &Order, admin_email: &str) -> Result<OutgoingEmail, EmailError> {
    Ok(OutgoingEmail {
        from_name: ORDER_SYSTEM_NAME,
        to: admin_email.to_string(),
        subject: format!("New Order #{}", order.id),
        text: OrderNotificationText { order }.render()?,
        html: OrderNotificationHtml { order }.render()?,
    })
}

/// Order confirmation for the customer, if the order has an email address.
///
/// # Errors
///
/// Returns `EmailError::Template` if rendering fails.
pub fn order_confirmation(order: &Order) -> Result<Option<OutgoingEmail>, EmailError> {
    let Some(to) = order.customer_email.as_deref() else {
        return Ok(None);
    };

    Ok(Some(OutgoingEmail {
        from_name: SHOP_NAME,
        to: to.to_string(),
        subject: format!("Your Order Confirmation #{}", order.id),
        text: OrderConfirmationText { order }.render()?,
        html: OrderConfirmationHtml { order }.render()?,
    }))
}

/// Result of one delivery attempt, reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailOutcome {
    pub recipient: String,
    pub message_id: Option<String>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl EmailOutcome {
    #[must_use]
    pub fn sent(recipient: impl Into<String>, message_id: String) -> Self {
        Self {
            recipient: recipient.into(),
            message_id: Some(message_id),
            error: None,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn failed(recipient: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self {
            recipient: recipient.into(),
            message_id: None,
            error: Some(error.to_string()),
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub const fn is_sent(&self) -> bool {
        self.message_id.is_some()
    }
}

/// Delivers rendered emails.
pub trait Mailer: Send + Sync {
    /// Send `email`, returning its message id.
    fn deliver(
        &self,
        email: OutgoingEmail,
    ) -> impl Future<Output = Result<String, EmailError>> + Send;
}

/// Deliver `email` and report the outcome instead of failing.
pub async fn send<M: Mailer>(mailer: &M, email: OutgoingEmail) -> EmailOutcome {
    let recipient = email.to.clone();
    let subject = email.subject.clone();

    match mailer.deliver(email).await {
        Ok(message_id) => {
            tracing::info!(to = %recipient, subject = %subject, message_id = %message_id, "Email sent");
            EmailOutcome::sent(recipient, message_id)
        }
        Err(e) => {
            tracing::error!(to = %recipient, subject = %subject, error = %e, "Email delivery failed");
            EmailOutcome::failed(recipient, e)
        }
    }
}

enum Transport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    Stub(AsyncStubTransport),
}

/// SMTP-backed [`Mailer`].
pub struct EmailService {
    transport: Transport,
    sender: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// Without credentials the service logs messages instead of sending them.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let (Some(username), Some(password)) = (&config.smtp_email, &config.smtp_password) else {
            tracing::warn!("Email notifications are disabled: SMTP credentials not provided");
            return Ok(Self::stub());
        };

        let credentials = Credentials::new(username.clone(), password.expose_secret().to_string());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport: Transport::Smtp(transport),
            sender: username.clone(),
        })
    }

    /// Service that accepts every message without sending it.
    #[must_use]
    pub fn stub() -> Self {
        Self {
            transport: Transport::Stub(AsyncStubTransport::new_ok()),
            sender: FALLBACK_SENDER.to_string(),
        }
    }

    fn build_message(
        &self,
        email: &OutgoingEmail,
        sender: Address,
        message_id: &str,
    ) -> Result<Message, EmailError> {
        let to: Address = email
            .to
            .parse()
            .map_err(|_| EmailError::InvalidAddress(email.to.clone()))?;

        let message = Message::builder()
            .from(Mailbox::new(Some(email.from_name.to_string()), sender))
            .to(Mailbox::new(None, to))
            .subject(&email.subject)
            .message_id(Some(message_id.to_string()))
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html.clone()),
                    ),
            )?;

        Ok(message)
    }
}

impl Mailer for EmailService {
    async fn deliver(&self, email: OutgoingEmail) -> Result<String, EmailError> {
        let sender: Address = self
            .sender
            .parse()
            .map_err(|_| EmailError::InvalidAddress(self.sender.clone()))?;
        let message_id = format!("<{}@{}>", Uuid::new_v4(), sender.domain());
        let message = self.build_message(&email, sender, &message_id)?;

        match &self.transport {
            Transport::Smtp(smtp) => {
                smtp.send(message).await?;
            }
            Transport::Stub(stub) => {
                stub.send(message).await?;
                tracing::info!(
                    to = %email.to,
                    subject = %email.subject,
                    "SMTP not configured, email logged instead of sent"
                );
            }
        }

        Ok(message_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use quardcube_core::{OrderId, OrderStatus, Price, ProductId, UserId};

    use super::*;
    use crate::models::{OrderLine, ShippingAddress};

    fn order(email: Option<&str>) -> Order {
        let placed = Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap();
        Order {
            id: OrderId::generate(),
            user_id: UserId::generate(),
            items: vec![OrderLine {
                product_id: ProductId::new(7),
                name: "Mirror <Cube>".to_string(),
                price: Price::from_cents(2_500),
                quantity: 2,
            }],
            total_amount: Price::from_cents(5_000),
            customer_name: "Amani".to_string(),
            customer_email: email.map(str::to_string),
            customer_phone: None,
            shipping_address: ShippingAddress {
                street: "12 Uhuru St".to_string(),
                city: "Arusha".to_string(),
                country: "Tanzania".to_string(),
                ..ShippingAddress::default()
            },
            payment_method: "Credit Card".to_string(),
            status: OrderStatus::Pending,
            created_at: placed,
            updated_at: placed,
        }
    }

    #[test]
    fn test_notification_goes_to_admin() {
        let order = order(Some("buyer@example.com"));
        let email = order_notification(&order, "shop@example.com").unwrap();

        assert_eq!(email.to, "shop@example.com");
        assert_eq!(email.subject, format!("New Order #{}", order.id));
        assert_eq!(email.from_name, "QuardCubeLabs Order System");
        assert!(!email.html.contains("<Cube>"));
        assert!(email.html.contains("Mirror &#60;Cube&#62;"));
        assert!(email.html.contains("$50.00"));
        assert!(email.text.contains("Mirror <Cube> x 2"));
    }

    #[test]
    fn test_confirmation_needs_customer_email() {
        assert!(order_confirmation(&order(None)).unwrap().is_none());

        let email = order_confirmation(&order(Some("buyer@example.com")))
            .unwrap()
            .unwrap();
        assert_eq!(email.to, "buyer@example.com");
        assert!(email.subject.starts_with("Your Order Confirmation #"));
        assert!(email.html.contains("Dear Amani"));
    }

    #[tokio::test]
    async fn test_stub_transport_returns_message_id() {
        let service = EmailService::stub();
        let email = order_notification(&order(None), "shop@example.com").unwrap();

        let outcome = send(&service, email).await;
        assert!(outcome.is_sent());
        assert!(outcome.message_id.unwrap().ends_with("@localhost>"));
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_reported() {
        let service = EmailService::stub();
        let mut email = order_notification(&order(None), "shop@example.com").unwrap();
        email.to = "not an address".to_string();

        let outcome = send(&service, email).await;
        assert!(!outcome.is_sent());
        assert!(outcome.error.unwrap().contains("not an address"));
    }
}
