use serde::{Deserialize, Serialize};
use validator::Validate;
use verification_tokens::TokenError;

/// A batch of SNS notifications delivered in one invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnsEvent {
    /// Records of the batch
    #[serde(rename = "Records", default)]
    pub records: Vec<SnsEventRecord>,
}

/// One record of an SNS batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnsEventRecord {
    /// The SNS notification carried by the record
    #[serde(rename = "Sns")]
    pub sns: SnsNotification,
}

/// The SNS notification of a record. Only the message is read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnsNotification {
    /// JSON-encoded verification request
    #[serde(rename = "Message")]
    pub message: String,
}

impl SnsEvent {
    /// Builds an event whose records carry `messages`.
    pub fn from_messages<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            records: messages
                .into_iter()
                .map(|message| SnsEventRecord {
                    sns: SnsNotification {
                        message: message.into(),
                    },
                })
                .collect(),
        }
    }
}

/// Payload of an SNS message asking for a verification email.
#[derive(Debug, Deserialize, Validate)]
pub struct VerificationMessage {
    /// Address the verification email goes to
    #[validate(required, length(min = 1, message = "email is required"))]
    pub email: Option<String>,

    /// Identifier of the user being verified, sent as a string or a number
    #[serde(rename = "userId", default, deserialize_with = "string_or_number")]
    #[validate(required, length(min = 1, message = "userId is required"))]
    pub user_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Identifier {
    Text(String),
    Number(serde_json::Number),
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Identifier>::deserialize(deserializer)?.map(|id| match id {
        Identifier::Text(text) => text,
        Identifier::Number(number) => number.to_string(),
    }))
}

/// A validated verification request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    /// Address the verification email goes to
    pub email: String,
    /// Identifier of the user being verified
    pub user_id: String,
}

impl TryFrom<VerificationMessage> for VerificationRequest {
    type Error = HandlerError;

    fn try_from(message: VerificationMessage) -> Result<Self, Self::Error> {
        message
            .validate()
            .map_err(|e| HandlerError::MissingFields(e.to_string()))?;

        match (message.email, message.user_id) {
            (Some(email), Some(user_id)) => Ok(Self { email, user_id }),
            _ => Err(HandlerError::MissingFields(
                "email and userId are required".to_string(),
            )),
        }
    }
}

/// Status-coded result returned to the invoking infrastructure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerResponse {
    /// 200 on success, 400 for client errors, 500 for server errors
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// JSON-encoded `{"message": ...}` or `{"error": ...}` object
    pub body: String,
}

/// Message returned when the verification email went out.
pub const SUCCESS_MESSAGE: &str = "Verification email sent successfully.";

impl HandlerResponse {
    /// A 200 result carrying `message`.
    pub fn success(message: &str) -> Self {
        Self {
            status_code: 200,
            body: serde_json::json!({ "message": message }).to_string(),
        }
    }

    /// An error result with `status_code` carrying `error`.
    pub fn error(status_code: u16, error: &str) -> Self {
        Self {
            status_code,
            body: serde_json::json!({ "error": error }).to_string(),
        }
    }

    /// Whether the result is a success.
    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

/// Failures of the verification dispatch handler.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The event carried no records.
    #[error("No records in the event")]
    EmptyBatch,

    /// The event envelope could not be parsed.
    #[error("Malformed event: {0}")]
    MalformedEvent(#[source] serde_json::Error),

    /// A record's message was not a JSON object.
    #[error("Malformed message payload: {0}")]
    MalformedPayload(#[source] serde_json::Error),

    /// A record lacked `email` or `userId`.
    #[error("Validation failed: {0}")]
    MissingFields(String),

    /// Issuing or persisting the token failed.
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// The email provider did not acknowledge the message.
    #[error("Email delivery failed")]
    Delivery,

    /// Anything else, including panics.
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl HandlerError {
    /// Status code reported for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            HandlerError::EmptyBatch
            | HandlerError::MalformedEvent(_)
            | HandlerError::MalformedPayload(_)
            | HandlerError::MissingFields(_) => 400,
            HandlerError::Token(_) | HandlerError::Delivery | HandlerError::Unexpected(_) => 500,
        }
    }

    /// Converts the error into the result reported to the caller.
    pub fn to_response(&self) -> HandlerResponse {
        let error = match self {
            HandlerError::EmptyBatch => "No records in the SNS event.",
            HandlerError::MalformedEvent(_) => "Malformed SNS event.",
            HandlerError::MalformedPayload(_) => "Malformed SNS message payload.",
            HandlerError::MissingFields(_) => "Missing email or userId in the SNS message.",
            HandlerError::Token(_) => "Failed to generate verification link.",
            HandlerError::Delivery => "Failed to send email.",
            HandlerError::Unexpected(_) => "An error occurred while processing the SNS event.",
        };

        HandlerResponse::error(self.status_code(), error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_from(json: &str) -> Result<VerificationRequest, HandlerError> {
        let message: VerificationMessage =
            serde_json::from_str(json).map_err(HandlerError::MalformedPayload)?;
        VerificationRequest::try_from(message)
    }

    #[test]
    fn test_event_envelope_deserializes() {
        let raw = r#"{
            "Records": [{
                "EventSource": "aws:sns",
                "Sns": {
                    "Type": "Notification",
                    "Message": "{\"email\":\"a@b.com\",\"userId\":\"u1\"}"
                }
            }]
        }"#;

        let event: SnsEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.records.len(), 1);
        assert_eq!(
            event.records[0].sns.message,
            r#"{"email":"a@b.com","userId":"u1"}"#
        );
    }

    #[test]
    fn test_valid_message() {
        let request = request_from(r#"{"email":"a@b.com","userId":"u1"}"#).unwrap();
        assert_eq!(
            request,
            VerificationRequest {
                email: "a@b.com".to_string(),
                user_id: "u1".to_string(),
            }
        );
    }

    #[test]
    fn test_numeric_user_id_is_accepted() {
        let request = request_from(r#"{"email":"a@b.com","userId":42}"#).unwrap();
        assert_eq!(request.user_id, "42");
    }

    #[test]
    fn test_non_scalar_user_id_is_malformed() {
        for json in [
            r#"{"email":"a@b.com","userId":true}"#,
            r#"{"email":"a@b.com","userId":{"id":1}}"#,
        ] {
            assert!(
                matches!(request_from(json), Err(HandlerError::MalformedPayload(_))),
                "{json} should be malformed"
            );
        }
    }

    #[test]
    fn test_missing_or_empty_fields() {
        for json in [
            r#"{"userId":"u1"}"#,
            r#"{"email":"a@b.com"}"#,
            r#"{"email":"","userId":"u1"}"#,
            r#"{"email":"a@b.com","userId":null}"#,
            r#"{"email":"a@b.com","token":"abc"}"#,
        ] {
            assert!(
                matches!(request_from(json), Err(HandlerError::MissingFields(_))),
                "{json} should fail validation"
            );
        }
    }

    #[test]
    fn test_non_object_payload_is_malformed() {
        assert!(matches!(
            request_from("not json"),
            Err(HandlerError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_error_responses() {
        let response = HandlerError::MissingFields("email".to_string()).to_response();
        assert_eq!(response.status_code, 400);
        assert_eq!(
            response.body,
            r#"{"error":"Missing email or userId in the SNS message."}"#
        );

        let response = HandlerError::Delivery.to_response();
        assert_eq!(response.status_code, 500);
        assert_eq!(response.body, r#"{"error":"Failed to send email."}"#);

        let response = HandlerError::Token(TokenError::Store("down".to_string())).to_response();
        assert_eq!(response.status_code, 500);
    }

    #[test]
    fn test_response_serializes_with_status_code_key() {
        let json = serde_json::to_value(HandlerResponse::success(SUCCESS_MESSAGE)).unwrap();
        assert_eq!(json["statusCode"], 200);
        assert_eq!(
            json["body"],
            r#"{"message":"Verification email sent successfully."}"#
        );
    }
}
