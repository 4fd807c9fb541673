//! Outbound email: password reset links and caregiver invitations.
//!
//! Delivery goes through SMTP in production or a directory of `.eml` files in development and
//! tests, chosen by `email.type` in the config.

use lettre::{
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::{path::Path, time::Duration};

use crate::{
    config::{Config, EmailTransportConfig},
    errors::Error,
    types::InvitationId,
};

pub struct EmailService {
    transport: EmailTransport,
    from: String,
    reply_to: Option<String>,
    base_url: String,
    reset_link_lifetime: Duration,
    invitation_lifetime: Duration,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

/// What a caregiver invitation email says about the invitation.
pub struct CaregiverInvitationEmail<'a> {
    pub invitation_id: InvitationId,
    pub to_email: &'a str,
    pub patient_name: &'a str,
    pub relationship_type: &'a str,
    pub is_mpoa: bool,
    pub message: Option<&'a str>,
}

fn internal(operation: &str, e: impl std::fmt::Display) -> Error {
    Error::Internal {
        operation: format!("{operation}: {e}"),
    }
}

impl EmailService {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let email = &config.email;

        let transport = match &email.transport {
            EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                if !use_tls {
                    tracing::warn!("SMTP TLS is disabled; invitation and reset links will travel in clear text");
                }
                let builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host).map_err(|e| internal("create SMTP transport", e))?
                } else {
                    AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
                };
                EmailTransport::Smtp(
                    builder
                        .port(*port)
                        .credentials(Credentials::new(username.clone(), password.clone()))
                        .build(),
                )
            }
            EmailTransportConfig::File { path } => {
                let dir = Path::new(path);
                std::fs::create_dir_all(dir).map_err(|e| internal("create emails directory", e))?;
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(dir))
            }
        };

        Ok(Self {
            transport,
            from: format!("{} <{}>", email.from_name, email.from_email),
            reply_to: email.reply_to.clone(),
            base_url: email.base_url.trim_end_matches('/').to_string(),
            reset_link_lifetime: config.auth.native.password_reset_token_duration,
            invitation_lifetime: config.invitations.expiry,
        })
    }

    #[tracing::instrument(skip_all, err)]
    pub async fn send_password_reset_email(&self, to_email: &str, to_name: &str, token_id: &uuid::Uuid, token: &str) -> Result<(), Error> {
        let link = format!("{}/auth/reset-password?id={token_id}&token={token}", self.base_url);
        let body = self.password_reset_body(to_name, &link);
        self.send(to_email, Some(to_name), "Reset your Home Care Portal password", body).await
    }

    #[tracing::instrument(skip_all, fields(invitation_id = %email.invitation_id), err)]
    pub async fn send_caregiver_invitation(&self, email: &CaregiverInvitationEmail<'_>) -> Result<(), Error> {
        let subject = format!("{} has invited you to join their care team", email.patient_name);
        let body = self.caregiver_invitation_body(email);
        self.send(email.to_email, None, &subject, body).await
    }

    async fn send(&self, to_email: &str, to_name: Option<&str>, subject: &str, body: String) -> Result<(), Error> {
        let from = self.from.parse::<Mailbox>().map_err(|e| internal("parse from address", e))?;
        let to = match to_name.filter(|n| !n.trim().is_empty()) {
            Some(name) => format!("{name} <{to_email}>"),
            None => to_email.to_string(),
        }
        .parse::<Mailbox>()
        .map_err(|e| internal("parse recipient address", e))?;

        let mut builder = Message::builder().from(from).to(to).subject(subject).header(ContentType::TEXT_HTML);
        if let Some(reply_to) = &self.reply_to {
            let reply_to = reply_to.parse::<Mailbox>().map_err(|e| internal("parse reply-to address", e))?;
            builder = builder.reply_to(reply_to);
        }
        let message = builder.body(body).map_err(|e| internal("build email message", e))?;

        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(|e| internal("send SMTP email", e))?;
            }
            EmailTransport::File(file) => {
                file.send(message).await.map_err(|e| internal("write email file", e))?;
            }
        }
        Ok(())
    }

    fn password_reset_body(&self, to_name: &str, link: &str) -> String {
        let minutes = self.reset_link_lifetime.as_secs() / 60;
        layout(
            "Reset your password",
            &format!(
                r#"<p>{greeting}</p>
        <p>We received a request to reset your Home Care Portal password. If you didn't ask for this, you can ignore this email.</p>
        <p><a href="{link}">Choose a new password</a></p>
        <p>Or paste this link into your browser:<br>{link}</p>
        <p>The link expires in {minutes} minutes.</p>"#,
                greeting = greeting(to_name),
            ),
        )
    }

    fn caregiver_invitation_body(&self, email: &CaregiverInvitationEmail<'_>) -> String {
        let link = format!("{}/dashboard/invitations?caregiver={}", self.base_url, email.invitation_id);
        let days = self.invitation_lifetime.as_secs() / 86_400;
        let mpoa = if email.is_mpoa {
            "<p>You have been named as their Medical Power of Attorney.</p>"
        } else {
            ""
        };
        let note = email
            .message
            .filter(|m| !m.trim().is_empty())
            .map(|m| format!("<blockquote>{}</blockquote>", escape(m)))
            .unwrap_or_default();

        layout(
            "You're invited to a care team",
            &format!(
                r#"<p>Hello,</p>
        <p>{patient} has invited you to join their home care team as their {relationship}.</p>
        {mpoa}
        {note}
        <p>Sign in or create a caregiver account with this email address to respond:</p>
        <p><a href="{link}">View invitation</a></p>
        <p>This invitation expires in {days} days.</p>"#,
                patient = escape(email.patient_name),
                relationship = escape(email.relationship_type),
            ),
        )
    }
}

fn greeting(name: &str) -> String {
    if name.trim().is_empty() {
        "Hello,".to_string()
    } else {
        format!("Hello {},", escape(name))
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

fn layout(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{title}</title>
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        .footer {{ margin-top: 30px; font-size: 12px; color: #666; }}
    </style>
</head>
<body>
    <div class="container">
        <h2>{title}</h2>
        {content}
        <div class="footer">
            <p>This is an automated message from the Home Care Portal.</p>
        </div>
    </div>
</body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_config;

    #[test]
    fn reset_body_has_link_and_lifetime() {
        let service = EmailService::new(&create_test_config()).unwrap();
        let body = service.password_reset_body("Ana Ruiz", "https://portal.example.com/auth/reset-password?id=1&token=abc");

        assert!(body.contains("Hello Ana Ruiz,"));
        assert!(body.contains("https://portal.example.com/auth/reset-password?id=1&token=abc"));
        assert!(body.contains("expires in 30 minutes"));
        assert!(service.password_reset_body("  ", "x").contains("Hello,"));
    }

    #[test]
    fn caregiver_body_escapes_patient_text() {
        let service = EmailService::new(&create_test_config()).unwrap();
        let id = uuid::Uuid::new_v4();
        let body = service.caregiver_invitation_body(&CaregiverInvitationEmail {
            invitation_id: id,
            to_email: "son@example.com",
            patient_name: "Maria <b>Lopez</b>",
            relationship_type: "son",
            is_mpoa: true,
            message: Some("Mom needs help with <meds>"),
        });

        assert!(body.contains("Maria &lt;b&gt;Lopez&lt;/b&gt;"));
        assert!(body.contains("Medical Power of Attorney"));
        assert!(body.contains("&lt;meds&gt;"));
        assert!(body.contains(&format!("caregiver={id}")));
        assert!(body.contains("expires in 7 days"));
    }

    #[tokio::test]
    async fn file_transport_writes_a_message() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = create_test_config();
        config.email.transport = crate::config::EmailTransportConfig::File {
            path: dir.path().to_string_lossy().to_string(),
        };
        let service = EmailService::new(&config).unwrap();
        service
            .send_caregiver_invitation(&CaregiverInvitationEmail {
                invitation_id: uuid::Uuid::new_v4(),
                to_email: "daughter@example.com",
                patient_name: "Maria Lopez",
                relationship_type: "daughter",
                is_mpoa: false,
                message: None,
            })
            .await
            .unwrap();

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
