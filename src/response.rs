use serde::{de, Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use crate::error::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    BadRequest,
    InternalServerError,
    GatewayTimeout,
}

impl Status {
    pub fn code(&self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::InternalServerError => 500,
            Status::GatewayTimeout => 504,
        }
    }

    pub fn from_code(code: u64) -> Option<Status> {
        match code {
            200 => Some(Status::Ok),
            400 => Some(Status::BadRequest),
            500 => Some(Status::InternalServerError),
            504 => Some(Status::GatewayTimeout),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Status::Ok)
    }
}

impl Serialize for Status {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u16(self.code())
    }
}

struct StatusCodeVisitor;

impl<'de> de::Visitor<'de> for StatusCodeVisitor {
    type Value = Status;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an HTTP status code")
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Status::from_code(v).ok_or_else(|| de::Error::custom(format!("unsupported status {v}")))
    }
}

impl<'de> de::Deserialize<'de> for Status {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_u16(StatusCodeVisitor)
    }
}

///
/// Envelope returned by every function. Failures carry `{"error": msg}` as
/// the body.
///
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePayload {
    pub status_code: Status,
    pub headers: Value,
    pub body: Value,
}

impl ResponsePayload {
    /// The error message of a failed response, if the body carries one.
    pub fn error_message(&self) -> Option<&str> {
        self.body.get("error").and_then(Value::as_str)
    }
}

pub fn make_response_payload(
    result: Result<Value, ServiceError>,
) -> Result<Value, lambda_runtime::Error> {
    let headers = json!({
        "Content-Type": "application/json",
        "Access-Control-Allow-Origin": "*"
    });
    let response_payload = match result {
        Err(err) => {
            tracing::error!(status = err.status.code(), error = %err.msg, "Request failed");
            ResponsePayload {
                status_code: err.status,
                headers,
                body: json!({ "error": err.msg }),
            }
        }
        Ok(body) => ResponsePayload {
            status_code: Status::Ok,
            headers,
            body,
        },
    };
    serde_json::to_value(response_payload).map_err(lambda_runtime::Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_payload_wraps_message() {
        let value =
            make_response_payload(Err(ServiceError::bad_request("Invalid input"))).unwrap();
        assert_eq!(value["statusCode"], 400);
        assert_eq!(value["body"], json!({ "error": "Invalid input" }));

        let payload: ResponsePayload = serde_json::from_value(value).unwrap();
        assert_eq!(payload.status_code, Status::BadRequest);
        assert_eq!(payload.error_message(), Some("Invalid input"));
    }

    #[test]
    fn unknown_status_codes_are_rejected() {
        let result: Result<Status, _> = serde_json::from_value(json!(418));
        assert!(result.is_err());
        assert_eq!(serde_json::from_value::<Status>(json!(504)).unwrap(), Status::GatewayTimeout);
    }
}
