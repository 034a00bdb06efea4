//! Contact form and newsletter signup.
//!
//! Submissions are validated and logged; nothing is stored.

use axum::{Json, http::StatusCode};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use quardcube_core::Email;

/// Contact form data.
#[derive(Debug, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub message: String,
}

/// Newsletter form data.
#[derive(Debug, Deserialize)]
pub struct NewsletterForm {
    pub email: String,
}

/// Response for form submission.
#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub success: bool,
    pub message: String,
}

impl ContactResponse {
    fn ok(message: &str) -> (StatusCode, Json<Self>) {
        (
            StatusCode::OK,
            Json(Self {
                success: true,
                message: message.to_string(),
            }),
        )
    }

    fn rejected(message: &str) -> (StatusCode, Json<Self>) {
        (
            StatusCode::BAD_REQUEST,
            Json(Self {
                success: false,
                message: message.to_string(),
            }),
        )
    }
}

/// Submit the contact form.
#[instrument(skip_all)]
pub async fn contact(Json(form): Json<ContactForm>) -> (StatusCode, Json<ContactResponse>) {
    let Ok(email) = Email::parse(&form.email) else {
        return ContactResponse::rejected("Please enter a valid email address.");
    };

    if form.name.trim().is_empty() || form.message.trim().is_empty() {
        return ContactResponse::rejected("Name and message are required.");
    }

    tracing::info!(
        email = %email,
        name = %form.name.trim(),
        subject = %form.subject.as_deref().unwrap_or("").trim(),
        message_len = form.message.trim().len(),
        "Contact form submitted"
    );

    ContactResponse::ok("Thank you for your message! We will get back to you soon.")
}

/// Subscribe to the newsletter.
#[instrument(skip_all)]
pub async fn newsletter(Json(form): Json<NewsletterForm>) -> (StatusCode, Json<ContactResponse>) {
    let Ok(email) = Email::parse(&form.email) else {
        return ContactResponse::rejected("Please enter a valid email address.");
    };

    tracing::info!(email = %email, "Newsletter subscription");
    ContactResponse::ok("Thank you for subscribing to our newsletter!")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_contact_requires_valid_email_and_message() {
        let (status, Json(body)) = contact(Json(ContactForm {
            name: "Amani".to_string(),
            email: "not-an-email".to_string(),
            subject: None,
            message: "Hi".to_string(),
        }))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!body.success);

        let (status, _) = contact(Json(ContactForm {
            name: "Amani".to_string(),
            email: "amani@example.com".to_string(),
            subject: Some("Bulk order".to_string()),
            message: "   ".to_string(),
        }))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_newsletter_acknowledges() {
        let (status, Json(body)) = newsletter(Json(NewsletterForm {
            email: "fan@example.com".to_string(),
        }))
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.message, "Thank you for subscribing to our newsletter!");
    }
}
