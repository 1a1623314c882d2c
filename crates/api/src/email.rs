// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

/// Attempts per connection method before falling through to the next one.
const SEND_ATTEMPTS: u32 = 2;

#[derive(Error, Debug)]
pub enum EmailError {
    #[error("invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Outbound SMTP configuration. Sending is best-effort by contract: callers
/// treat a failure as a warning, never as a request failure.
#[derive(Clone)]
pub struct Mailer {
    smtp_server: String,
    smtp_port: u16,
    username: String,
    password: String,
    from_address: String,
}

impl Mailer {
    /// Build from the EMAIL_* environment variables; `None` when any of the
    /// required ones is missing (the caller logs the degradation).
    pub fn from_env() -> Option<Self> {
        let smtp_server = std::env::var("EMAIL_SMTP_SERVER").ok()?;
        let username = std::env::var("EMAIL_SMTP_USERNAME").ok()?;
        let password = std::env::var("EMAIL_SMTP_PASSWORD").ok()?;
        let from_address = std::env::var("EMAIL_FROM_ADDRESS").ok()?;
        let smtp_port = std::env::var("EMAIL_SMTP_PORT")
            .ok()
            .and_then(|port| port.parse().ok())
            .unwrap_or(587);

        Some(Self {
            smtp_server,
            smtp_port,
            username,
            password,
            from_address,
        })
    }

    /// Notify a team lead that their team was approved, including the portal
    /// credentials provisioned during approval.
    pub async fn send_credentials_email(
        &self,
        to: &str,
        team_name: &str,
        lead_name: &str,
        username: &str,
        password: &str,
    ) -> Result<(), EmailError> {
        let message = Message::builder()
            .from(self.from_address.parse()?)
            .to(to.parse()?)
            .subject(format!("Your team \"{team_name}\" has been approved"))
            .header(ContentType::TEXT_PLAIN)
            .body(credentials_email_body(team_name, lead_name, username, password))?;

        self.send_with_fallback(message).await
    }

    /// STARTTLS on the configured port first, then an implicit-TLS relay on
    /// the submissions port, each with a bounded number of attempts.
    async fn send_with_fallback(&self, message: Message) -> Result<(), EmailError> {
        let credentials = Credentials::new(self.username.clone(), self.password.clone());
        let transports: Vec<(&str, AsyncSmtpTransport<Tokio1Executor>)> = vec![
            (
                "starttls",
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.smtp_server)?
                    .port(self.smtp_port)
                    .credentials(credentials.clone())
                    .build(),
            ),
            (
                "tls",
                AsyncSmtpTransport::<Tokio1Executor>::relay(&self.smtp_server)?
                    .credentials(credentials)
                    .build(),
            ),
        ];

        let mut last_error = None;
        for (method, transport) in &transports {
            for attempt in 1..=SEND_ATTEMPTS {
                match transport.send(message.clone()).await {
                    Ok(_) => return Ok(()),
                    Err(err) => {
                        tracing::warn!(
                            "SMTP send via {method} failed (attempt {attempt}/{SEND_ATTEMPTS}): {err}"
                        );
                        last_error = Some(err);
                    }
                }
            }
        }

        match last_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}

pub fn credentials_email_body(
    team_name: &str,
    lead_name: &str,
    username: &str,
    password: &str,
) -> String {
    format!(
        "Dear {lead_name},\n\n\
         Congratulations! Your team \"{team_name}\" has been approved for the hackathon.\n\n\
         Your login credentials are:\n\n\
         Username: {username}\n\
         Password: {password}\n\n\
         Use them to log in to the portal. Do not share these credentials with\n\
         anyone outside your team. If you have any issues, please contact the\n\
         organizers.\n\n\
         Best regards,\n\
         The organizing team\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_email_body_contains_credentials() {
        let body = credentials_email_body(
            "Dumbledore's Army",
            "Harry Potter",
            "Harry Potter",
            "UTR123456",
        );
        assert!(body.contains("Dumbledore's Army"));
        assert!(body.contains("Username: Harry Potter"));
        assert!(body.contains("Password: UTR123456"));
    }
}
