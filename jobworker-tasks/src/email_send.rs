//! Email send task (§4.10): composes a MIME message and delivers it over
//! SMTP (optionally STARTTLS). Every address is validated locally before a
//! connection is attempted.

use async_trait::async_trait;
use jobworker_shared::error::{ErrorKind, ErrorRecord};
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, Message, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use jobworker_runtime::task::{Task, TaskContext};

#[derive(Debug, Deserialize)]
struct Input {
    from: String,
    to: Vec<String>,
    #[serde(default)]
    cc: Vec<String>,
    #[serde(rename = "replyTo", default)]
    reply_to: Option<String>,
    subject: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    html: Option<String>,
    #[serde(default)]
    priority: Option<String>,
}

#[derive(Debug, Serialize)]
struct Output {
    sent: bool,
    #[serde(rename = "recipientCount")]
    recipient_count: usize,
}

pub struct EmailSendTask {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailSendTask {
    pub fn new(relay: &str, username: &str, password: &str, starttls: bool) -> Result<Self, anyhow::Error> {
        let builder = if starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(relay)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(relay)?
        };
        let transport = builder
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .build();
        Ok(Self { transport })
    }

    fn parse_mailbox(raw: &str) -> Result<Mailbox, ErrorRecord> {
        raw.parse::<Mailbox>()
            .map_err(|e| ErrorRecord::new(ErrorKind::ValidationFailed, format!("invalid address '{raw}': {e}")))
    }
}

#[async_trait]
impl Task for EmailSendTask {
    fn task_type(&self) -> &'static str {
        "email_send"
    }

    async fn execute(&self, _ctx: &TaskContext, input: Value) -> Result<Value, ErrorRecord> {
        let input: Input = serde_json::from_value(input).map_err(|e| ErrorRecord::new(ErrorKind::ParseError, e.to_string()))?;

        if input.to.is_empty() {
            return Err(ErrorRecord::new(ErrorKind::ValidationFailed, "at least one recipient is required"));
        }
        if input.text.is_none() && input.html.is_none() {
            return Err(ErrorRecord::new(ErrorKind::ValidationFailed, "email body must be text or html"));
        }

        let from = Self::parse_mailbox(&input.from)?;
        let mut builder = Message::builder().from(from).subject(&input.subject);

        for addr in &input.to {
            builder = builder.to(Self::parse_mailbox(addr)?);
        }
        for addr in &input.cc {
            builder = builder.cc(Self::parse_mailbox(addr)?);
        }
        if let Some(reply_to) = &input.reply_to {
            builder = builder.reply_to(Self::parse_mailbox(reply_to)?);
        }
        if let Some(priority) = &input.priority {
            builder = builder.header(lettre::message::header::Header::new_raw(
                "X-Priority".to_string(),
                priority.clone(),
            ));
        }

        let recipient_count = input.to.len() + input.cc.len();

        let message = match (input.text, input.html) {
            (Some(text), Some(html)) => builder
                .multipart(MultiPart::alternative_plain_html(text, html))
                .map_err(|e| ErrorRecord::new(ErrorKind::ValidationFailed, e.to_string()))?,
            (Some(text), None) => builder
                .singlepart(SinglePart::builder().header(ContentType::TEXT_PLAIN).body(text))
                .map_err(|e| ErrorRecord::new(ErrorKind::ValidationFailed, e.to_string()))?,
            (None, Some(html)) => builder
                .singlepart(SinglePart::builder().header(ContentType::TEXT_HTML).body(html))
                .map_err(|e| ErrorRecord::new(ErrorKind::ValidationFailed, e.to_string()))?,
            (None, None) => unreachable!("validated above"),
        };

        self.transport
            .send(message)
            .await
            .map_err(|e| ErrorRecord::new(ErrorKind::SmtpError, e.to_string()))?;

        serde_json::to_value(Output {
            sent: true,
            recipient_count,
        })
        .map_err(|e| ErrorRecord::new(ErrorKind::Unknown, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobworker_shared::logger::Logger;
    use serde_json::json;
    use std::time::Duration;

    fn ctx() -> TaskContext {
        TaskContext::new(1, Duration::from_secs(5), Logger::noop())
    }

    fn task() -> EmailSendTask {
        EmailSendTask::new("localhost:2525", "user", "pass", true).unwrap()
    }

    #[tokio::test]
    async fn invalid_from_address_is_validation_failed() {
        let err = task()
            .execute(
                &ctx(),
                json!({"from": "not-an-address", "to": ["a@example.com"], "subject": "hi", "text": "hello"}),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind.wire_code(""), "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn missing_recipients_is_validation_failed() {
        let err = task()
            .execute(
                &ctx(),
                json!({"from": "a@example.com", "to": [], "subject": "hi", "text": "hello"}),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind.wire_code(""), "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn missing_body_is_validation_failed() {
        let err = task()
            .execute(
                &ctx(),
                json!({"from": "a@example.com", "to": ["b@example.com"], "subject": "hi"}),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind.wire_code(""), "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn dial_failure_is_smtp_error_not_validation() {
        // Nothing listens on this port; the send attempt should fail as a
        // transport/SMTP error after validation already passed.
        let err = task()
            .execute(
                &ctx(),
                json!({"from": "a@example.com", "to": ["b@example.com"], "subject": "hi", "text": "hello"}),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind.wire_code(""), "SMTP_ERROR");
        assert!(err.retryable);
    }
}
