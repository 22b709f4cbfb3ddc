use crate::config::MailConfig;
use sendgrid::SGClient;
use sendgrid::{Destination, Mail};
use tracing::{error, info, warn};

/// Sends account mails through SendGrid. Without an API key the mail is
/// only logged, which is what development and tests run with.
#[derive(Clone)]
pub struct Mailer {
    client: Option<SGClient>,
    from: String,
}

impl Mailer {
    pub fn new(config: &MailConfig) -> Self {
        let client = config.sendgrid_api_key.clone().map(SGClient::new);
        if client.is_none() {
            warn!("SendGrid API key not found. Account mails will be logged instead of sent.");
        }
        Self {
            client,
            from: config.from.clone(),
        }
    }

    pub async fn send_activation(&self, to: &str, link: &str) -> Result<(), String> {
        let body = format!(
            "Welcome to Videoflix!\n\nPlease confirm your e-mail address by opening this link:\n{link}\n"
        );
        self.send("activation", to, "Confirm your e-mail address", &body)
            .await
    }

    pub async fn send_password_reset(&self, to: &str, link: &str) -> Result<(), String> {
        let body = format!(
            "We received a request to reset your Videoflix password.\n\nChoose a new password here:\n{link}\n\nIf you did not ask for this, ignore this mail.\n"
        );
        self.send("password_reset", to, "Reset password", &body).await
    }

    async fn send(
        &self,
        kind: &'static str,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), String> {
        let Some(client) = &self.client else {
            info!(kind, to, subject, body, "mail delivery mocked");
            return Ok(());
        };

        let mail = Mail::new()
            .add_to(Destination {
                address: to,
                name: to,
            })
            .add_from(&self.from)
            .add_subject(subject)
            .add_text(body);

        match client.send(mail).await {
            Ok(_) => {
                info!(kind, to, "mail sent");
                crate::metrics::increment_mails_sent(kind);
                Ok(())
            }
            Err(e) => {
                error!(kind, to, error = %e, "failed to send mail");
                crate::metrics::increment_mails_failed(kind);
                Err(e.to_string())
            }
        }
    }
}
