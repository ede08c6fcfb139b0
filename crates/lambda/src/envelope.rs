//! Response envelopes.
//!
//! Every outcome of a request, good or bad, leaves the handler as the same
//! JSend-style structure:
//!
//! ```json
//! { "data": {...}, "status": "success", "env": "prod",
//!   "id": "0192...", "created": "2026-10-18T09:30:00.123Z" }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Outcome tag of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The query was answered
    Success,
    /// The request was unusable (client error)
    Fail,
    /// Something broke while answering (server error)
    Error,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Success, Status::Fail, Status::Error];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::Fail => "fail",
            Status::Error => "error",
        }
    }

    /// The HTTP status code an entry layer must answer with.
    pub fn http_code(self) -> u16 {
        match self {
            Status::Success => 200,
            Status::Fail => 400,
            Status::Error => 500,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Status::Success),
            "fail" => Ok(Status::Fail),
            "error" => Ok(Status::Error),
            other => Err(EnvelopeError::InvalidStatus(other.to_string())),
        }
    }
}

/// Which deployment answered, derived from the invoked function ARN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvLabel {
    /// No ARN at all: running outside the serverless platform
    Local,
    Staging,
    Prod,
    /// A numbered, unaliased version
    Version,
    /// `$LATEST` or any alias we do not recognize
    Latest,
}

impl EnvLabel {
    /// Resolve the label from the segment after the last `:` of an ARN.
    ///
    /// ```
    /// use hestia_lambda::envelope::EnvLabel;
    ///
    /// let arn = "arn:aws:lambda:eu-west-1:123456789012:function:hestia:prod";
    /// assert_eq!(EnvLabel::from_arn(Some(arn)), EnvLabel::Prod);
    /// assert_eq!(EnvLabel::from_arn(None), EnvLabel::Local);
    /// ```
    pub fn from_arn(arn: Option<&str>) -> Self {
        let Some(arn) = arn else {
            return EnvLabel::Local;
        };
        let segment = arn.rsplit(':').next().unwrap_or(arn);
        match segment {
            "staging" => EnvLabel::Staging,
            "prod" => EnvLabel::Prod,
            s if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => EnvLabel::Version,
            _ => EnvLabel::Latest,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EnvLabel::Local => "local",
            EnvLabel::Staging => "staging",
            EnvLabel::Prod => "prod",
            EnvLabel::Version => "version",
            EnvLabel::Latest => "latest",
        }
    }
}

impl fmt::Display for EnvLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope construction errors. Both are programming mistakes, never the
/// result of user input.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("Invalid status: {0:?} (expected success, fail or error)")]
    InvalidStatus(String),

    #[error("Response is not JSON serializable: {0}")]
    NotSerializable(#[source] serde_json::Error),
}

/// The normalized response structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub data: serde_json::Value,
    pub status: Status,
    pub env: EnvLabel,
    /// Time-ordered (UUIDv7), fresh for every envelope
    pub id: Uuid,
    pub created: DateTime<Utc>,
}

impl Envelope {
    /// Wrap data that is already a JSON value.
    pub fn from_value(data: serde_json::Value, status: Status, arn: Option<&str>) -> Self {
        Self {
            data,
            status,
            env: EnvLabel::from_arn(arn),
            id: Uuid::now_v7(),
            created: Utc::now(),
        }
    }

    /// Serialize `data` and wrap it. NaN and the infinities are refused
    /// rather than written as `null`.
    pub fn build<T>(data: &T, status: Status, arn: Option<&str>) -> Result<Self, EnvelopeError>
    where
        T: Serialize + ?Sized,
    {
        crate::finite::ensure_finite(data).map_err(EnvelopeError::NotSerializable)?;
        let data = serde_json::to_value(data).map_err(EnvelopeError::NotSerializable)?;
        Ok(Self::from_value(data, status, arn))
    }

    /// Encode for transport.
    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        serde_json::to_string(self).map_err(EnvelopeError::NotSerializable)
    }
}

/// Build an envelope from an untyped status tag.
///
/// Fails with [`EnvelopeError::InvalidStatus`] before anything else is
/// looked at, and with [`EnvelopeError::NotSerializable`] if `data` has no
/// exact JSON representation.
pub fn make_response<T>(data: &T, status: &str, arn: Option<&str>) -> Result<Envelope, EnvelopeError>
where
    T: Serialize + ?Sized,
{
    let status: Status = status.parse()?;
    Envelope::build(data, status, arn)
}
