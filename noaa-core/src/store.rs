use log::{error, info};
use object_store::{
    Attribute, Attributes, ClientOptions, ObjectStore, PutOptions, PutPayload,
    aws::AmazonS3Builder, local::LocalFileSystem, path::Path as ObjectPath,
};
use serde_json::Value;
use std::{fs, path::Path, sync::Arc, time::Duration};

use crate::{
    config::{S3Config, StoreBackend, StoreConfig},
    error::{StoreSetupError, UploadError},
    model::StorageKey,
};

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// What a successful upload wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub url: String,
    pub bytes: usize,
    pub e_tag: Option<String>,
}

/// Writes raw API payloads as JSON objects.
///
/// A store that could not be set up is kept as an error and reported on the
/// first upload, so a bad store config never prevents the fetch.
#[derive(Debug)]
pub struct ObjectUploader {
    store: Result<Arc<dyn ObjectStore>, StoreSetupError>,
    base_url: String,
    content_type: bool,
}

impl ObjectUploader {
    /// Wrap an existing store. `base_url` is only used for logs and receipts.
    pub fn new(store: Arc<dyn ObjectStore>, base_url: impl Into<String>) -> Self {
        Self { store: Ok(store), base_url: base_url.into(), content_type: true }
    }

    pub fn unavailable(reason: StoreSetupError) -> Self {
        Self { store: Err(reason), base_url: String::new(), content_type: false }
    }

    pub fn from_config(config: &StoreConfig, timeout: Duration) -> Self {
        match &config.backend {
            StoreBackend::S3(s3) => match build_s3(s3, timeout) {
                Ok((store, base_url)) => Self::new(store, base_url),
                Err(reason) => Self::unavailable(reason),
            },
            StoreBackend::Local(dir) => match build_local(dir) {
                // The local backend rejects object attributes.
                Ok((store, base_url)) => Self { content_type: false, ..Self::new(store, base_url) },
                Err(reason) => Self::unavailable(reason),
            },
        }
    }

    /// Why the store is unusable, if it is.
    pub fn setup_error(&self) -> Option<&StoreSetupError> {
        self.store.as_ref().err()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn object_url(&self, key: &StorageKey) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    /// Serialize `data` and write it under `key`, replacing any object already there.
    pub async fn upload_json(
        &self,
        data: &Value,
        key: &StorageKey,
    ) -> Result<UploadReceipt, UploadError> {
        let store = self.store.as_ref().map_err(|reason| UploadError::Setup(reason.clone()))?;

        let body = encode_json(data)?;
        let bytes = body.len();

        let mut attributes = Attributes::new();
        if self.content_type {
            attributes.insert(Attribute::ContentType, JSON_CONTENT_TYPE.into());
        }
        let opts = PutOptions { attributes, ..PutOptions::default() };

        let result = store
            .put_opts(&ObjectPath::from(key.as_str()), PutPayload::from(body), opts)
            .await
            .map_err(classify_store_error)?;

        let url = self.object_url(key);
        info!("Successfully uploaded data to {url} ({bytes} bytes)");

        Ok(UploadReceipt { url, bytes, e_tag: result.e_tag })
    }
}

/// Authentication failures become `MissingCredentials`; everything else stays a store error.
fn classify_store_error(err: object_store::Error) -> UploadError {
    match err {
        object_store::Error::Unauthenticated { .. } => {
            error!("Object store rejected the request as unauthenticated: {err}");
            UploadError::Setup(StoreSetupError::MissingCredentials)
        }
        other => UploadError::Store(other),
    }
}

/// Compact JSON text, keeping the key order of the response.
pub fn encode_json(data: &Value) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(data)
}

fn build_s3(
    config: &S3Config,
    timeout: Duration,
) -> Result<(Arc<dyn ObjectStore>, String), StoreSetupError> {
    let bucket = config.bucket.as_deref().ok_or(StoreSetupError::MissingBucket)?;

    // Without static keys the builder falls back to web identity, container
    // or instance metadata credentials picked up from the environment.
    let mut builder = AmazonS3Builder::from_env()
        .with_bucket_name(bucket)
        .with_client_options(ClientOptions::new().with_timeout(timeout))
        .with_allow_http(config.allow_http);

    match &config.credentials {
        Some(credentials) => {
            builder = builder
                .with_access_key_id(&credentials.access_key_id)
                .with_secret_access_key(&credentials.secret_access_key);
            if let Some(token) = &credentials.session_token {
                builder = builder.with_token(token);
            }
        }
        None => info!("No static AWS keys configured, using the default credential chain"),
    }
    if let Some(region) = &config.region {
        builder = builder.with_region(region);
    }
    if let Some(endpoint) = &config.endpoint {
        // Path-style requests for S3-compatible endpoints such as MinIO.
        builder = builder.with_endpoint(endpoint).with_virtual_hosted_style_request(false);
    }

    let store = builder.build().map_err(|err| {
        error!("Failed to create S3 store: {err}");
        StoreSetupError::Invalid(err.to_string())
    })?;

    Ok((Arc::new(store), format!("s3://{bucket}")))
}

fn build_local(dir: &Path) -> Result<(Arc<dyn ObjectStore>, String), StoreSetupError> {
    fs::create_dir_all(dir).map_err(|err| {
        StoreSetupError::Invalid(format!("Failed to create {}: {err}", dir.display()))
    })?;

    let store = LocalFileSystem::new_with_prefix(dir)
        .map_err(|err| StoreSetupError::Invalid(err.to_string()))?;

    Ok((Arc::new(store), format!("file://{}", dir.display())))
}
