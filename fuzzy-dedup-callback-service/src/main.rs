use fuzzy_dedup_service::dto::DetectConfig;
use fuzzy_dedup_service::error::ServiceError;
use fuzzy_dedup_service::response::{make_response_payload, ResponsePayload, Status};
use fuzzy_dedup_service::{logging, util};

use bytes::Bytes;
use lambda_runtime::{run, service_fn, Context, Error, LambdaEvent};
use lazy_static::lazy_static;
use rusoto_core::{Client, Region};
use rusoto_kms::{DecryptRequest, Kms, KmsClient};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;

struct CallbackSettings {
    region: Region,
    /// Endpoint notified of every detection outcome
    endpoint: String,
    /// Base64 KMS ciphertext of the endpoint's api key
    api_key: String,
    /// Symmetric encryption key ID stored in AWS KMS
    key_id: String,
}

impl CallbackSettings {
    fn from_env() -> Result<Self, ServiceError> {
        Ok(CallbackSettings {
            region: util::get_region()?,
            endpoint: util::get_env_var("ENDPOINT")?,
            api_key: util::get_env_var("API_KEY")?,
            key_id: util::get_env_var("KEY_ID")?,
        })
    }
}

lazy_static! {
    static ref SETTINGS: Result<CallbackSettings, ServiceError> = CallbackSettings::from_env();
}

/// What the endpoint receives for one detect invocation.
#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct Notification {
    status_code: Status,
    body: Value,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    logging::init();
    run(service_fn(process)).await?;
    Ok(())
}

async fn process(event: LambdaEvent<Value>) -> Result<Value, Error> {
    let (payload, context) = event.into_parts();
    let result = callback(payload, &context).await;
    make_response_payload(result)
}

async fn callback(payload: Value, context: &Context) -> Result<Value, ServiceError> {
    let settings = SETTINGS.as_ref().map_err(Clone::clone)?;
    let notification = extract(&payload)?;
    tracing::info!(
        status = notification.status_code.code(),
        "Forwarding detection outcome"
    );
    let client = reqwest::Client::builder()
        .build()
        .map_err(ServiceError::internal_server_error)?;
    let key = decrypt_api_key(settings, function_name(context)?).await?;
    client
        .post(settings.endpoint.as_str())
        .header("X-API-KEY", key.as_str())
        .header("CONTENT-TYPE", "application/json")
        .json(&notification)
        .send()
        .await
        .map_err(ServiceError::internal_server_error)?
        .error_for_status()
        .map_err(ServiceError::internal_server_error)?;
    Ok(json!({}))
}

///
/// Builds the notification from a destination event. Successful runs pass their
/// body through; failures report the message together with the request that
/// produced them.
///
fn extract(payload: &Value) -> Result<Notification, ServiceError> {
    let response = payload
        .get("responsePayload")
        .ok_or_else(|| ise("No 'responsePayload' object found"))?;
    match serde_json::from_value::<ResponsePayload>(response.to_owned()) {
        Ok(resp) if resp.status_code.is_success() => Ok(Notification {
            status_code: resp.status_code,
            body: resp.body,
        }),
        Ok(resp) => {
            let message = resp
                .error_message()
                .map(str::to_string)
                .unwrap_or_else(|| resp.body.to_string());
            failure(payload, resp.status_code, message)
        }
        Err(_) => {
            // The function itself errored (panic, timeout, bad event).
            let msg = response
                .get("errorMessage")
                .ok_or_else(|| ise("No 'errorMessage' field found"))?
                .as_str()
                .ok_or_else(|| ise("Unable to parse error message"))?;
            let status = if msg.contains("timed out") {
                Status::GatewayTimeout
            } else {
                Status::InternalServerError
            };
            failure(payload, status, msg.to_string())
        }
    }
}

fn failure(payload: &Value, status: Status, message: String) -> Result<Notification, ServiceError> {
    let request = payload
        .get("requestPayload")
        .ok_or_else(|| ise("No 'requestPayload' object found"))?;
    // A request that never parsed is forwarded as received.
    let config = match serde_json::from_value::<DetectConfig>(request.to_owned()) {
        Ok(config) => serde_json::to_value(config).map_err(ServiceError::internal_server_error)?,
        Err(_) => request.to_owned(),
    };
    Ok(Notification {
        status_code: status,
        body: json!({ "message": message, "config": config }),
    })
}

fn ise(msg: &str) -> ServiceError {
    ServiceError::internal_server_error(msg)
}

async fn decrypt_api_key(
    settings: &CallbackSettings,
    function_name: &str,
) -> Result<String, ServiceError> {
    let client = KmsClient::new_with_client(Client::shared(), settings.region.clone());
    let context = HashMap::from([(
        String::from("LambdaFunctionName"),
        String::from(function_name),
    )]);
    let ciphertext =
        base64::decode(settings.api_key.as_bytes()).map_err(|err| ise(&err.to_string()))?;
    let request = DecryptRequest {
        ciphertext_blob: Bytes::from(ciphertext),
        key_id: Some(settings.key_id.clone()),
        encryption_context: Some(context),
        ..Default::default()
    };
    let response = client
        .decrypt(request)
        .await
        .map_err(|err| ise(&err.to_string()))?;
    match response.plaintext {
        Some(bytes) => {
            String::from_utf8(bytes.into_iter().collect()).map_err(|err| ise(&err.to_string()))
        }
        None => Err(ise("Unable to decode api key")),
    }
}

fn function_name(context: &Context) -> Result<&str, ServiceError> {
    context
        .invoked_function_arn
        .rsplit(':')
        .next()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ise("Unable to extract function name"))
}
