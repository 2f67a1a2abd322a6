use crate::error::ServiceError;
use futures::stream::TryStreamExt;
use rusoto_core::{Region, RusotoError};
use rusoto_s3::{GetObjectError, GetObjectRequest, PutObjectRequest, S3Client, S3};
use std::env;
use std::str::FromStr;

pub fn get_region() -> Result<Region, ServiceError> {
    let val = get_env_var("REGION")?;
    Region::from_str(val.as_str()).map_err(|_| {
        ServiceError::internal_server_error(format!("Unable to parse region {}", val))
    })
}

pub fn get_env_var(name: &str) -> Result<String, ServiceError> {
    env::var(name).map_err(|_| {
        ServiceError::internal_server_error(format!("Environment variable '{}' not found", name))
    })
}

///
/// Reads and parses an optional environment variable, falling back to `default`
/// when it is unset. A value that is present but unparsable is an error.
///
pub fn get_env_parsed<T: FromStr>(name: &str, default: T) -> Result<T, ServiceError> {
    match env::var(name) {
        Ok(val) => val.trim().parse().map_err(|_| {
            ServiceError::internal_server_error(format!(
                "Unable to parse environment variable '{}' value '{}'",
                name, val
            ))
        }),
        Err(_) => Ok(default),
    }
}

pub async fn download_object_from_s3(
    client: &S3Client,
    bucket: String,
    key: String,
) -> Result<Vec<u8>, ServiceError> {
    tracing::debug!(%bucket, %key, "Downloading object");
    let request = GetObjectRequest {
        bucket: bucket.clone(),
        key: key.clone(),
        ..Default::default()
    };
    let mut object = client.get_object(request).await.map_err(|err| match err {
        RusotoError::Service(GetObjectError::NoSuchKey(_)) => {
            ServiceError::bad_request(format!("Object '{}' not found in '{}'", key, bucket))
        }
        err => ServiceError::internal_server_error(err),
    })?;
    let body = object
        .body
        .take()
        .ok_or_else(|| ServiceError::internal_server_error("Unable to extract body"))?;
    body.map_ok(|b| b.to_vec())
        .try_concat()
        .await
        .map_err(ServiceError::internal_server_error)
}

pub async fn upload_object_to_s3(
    client: &S3Client,
    object: Vec<u8>,
    bucket: String,
    key: String,
    content_type: &str,
) -> Result<(), ServiceError> {
    tracing::debug!(%bucket, %key, bytes = object.len(), "Uploading object");
    let request = PutObjectRequest {
        bucket,
        key,
        body: Some(object.into()),
        content_type: Some(content_type.to_string()),
        ..Default::default()
    };
    client
        .put_object(request)
        .await
        .map(|_| ())
        .map_err(ServiceError::internal_server_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::Status;

    #[test]
    fn parsed_env_vars_fall_back_and_validate() {
        env::remove_var("FUZZY_DEDUP_TEST_UNSET");
        assert_eq!(get_env_parsed("FUZZY_DEDUP_TEST_UNSET", 42usize).unwrap(), 42);

        env::set_var("FUZZY_DEDUP_TEST_SET", " 7 ");
        assert_eq!(get_env_parsed("FUZZY_DEDUP_TEST_SET", 0usize).unwrap(), 7);

        env::set_var("FUZZY_DEDUP_TEST_BAD", "lots");
        let err = get_env_parsed("FUZZY_DEDUP_TEST_BAD", 0usize).unwrap_err();
        assert_eq!(err.status, Status::InternalServerError);
    }

    #[test]
    fn missing_env_var_names_the_variable() {
        env::remove_var("FUZZY_DEDUP_TEST_MISSING");
        let err = get_env_var("FUZZY_DEDUP_TEST_MISSING").unwrap_err();
        assert!(err.msg.contains("FUZZY_DEDUP_TEST_MISSING"));
    }
}
