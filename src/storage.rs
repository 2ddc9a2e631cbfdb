use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::presigning::PresigningConfig;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Prefix under which every post image is stored.
pub const POST_IMAGES_PREFIX: &str = "post_images";

/// How long a presigned upload URL stays valid.
const UPLOAD_URL_TTL: Duration = Duration::from_secs(600);

/// StorageService
///
/// Contract for the object store holding post images. Implemented by the S3 client
/// (MinIO locally) and by an in-memory mock for tests.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the configured bucket if missing. Only called in `Env::Local`.
    async fn ensure_bucket_exists(&self);

    /// Generates a temporary signed URL allowing the client to PUT `key` directly,
    /// constrained to `content_type`.
    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, String>;

    /// Removes an image that is no longer referenced by any post.
    async fn delete_object(&self, key: &str) -> Result<(), String>;
}

/// S3StorageClient
///
/// Storage backed by the AWS SDK. Path-style addressing keeps it compatible with
/// MinIO and other S3-compatible gateways.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
}

impl S3StorageClient {
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    async fn ensure_bucket_exists(&self) {
        // CreateBucket fails harmlessly when the bucket already exists.
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            tracing::debug!("create_bucket: {:?}", e);
        }
    }

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, String> {
        let presigning = PresigningConfig::expires_in(UPLOAD_URL_TTL).map_err(|e| e.to_string())?;

        let presigned_req = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(sanitize_key(key))
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| e.to_string())?;

        Ok(presigned_req.uri().to_string())
    }

    async fn delete_object(&self, key: &str) -> Result<(), String> {
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(sanitize_key(key))
            .send()
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// sanitize_key
///
/// Strips directory navigation (`..`, `.`) and empty segments from a key.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Key prefix holding the images uploaded by `owner`.
pub fn owner_image_prefix(owner: uuid::Uuid) -> String {
    format!("{POST_IMAGES_PREFIX}/{owner}/")
}

/// Whether `key` lies under the images uploaded by `owner`.
pub fn is_owned_image_key(key: &str, owner: uuid::Uuid) -> bool {
    key.strip_prefix(&owner_image_prefix(owner))
        .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
}

/// Builds the object key for a new post image uploaded by `owner`, keeping a short
/// alphanumeric extension from the uploaded filename.
pub fn post_image_key(owner: uuid::Uuid, filename: &str, id: uuid::Uuid) -> String {
    let extension = std::path::Path::new(filename)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "bin".to_string());
    format!("{}{id}.{extension}", owner_image_prefix(owner))
}

/// MockStorageService
///
/// In-memory storage for tests. Records deleted keys so tests can assert cleanup.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    deleted: Arc<Mutex<Vec<String>>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted.lock().map(|keys| keys.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {}

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        _content_type: &str,
    ) -> Result<String, String> {
        if self.should_fail {
            return Err("Mock Storage Error: Simulation requested".to_string());
        }
        Ok(format!(
            "http://localhost:9000/mock-bucket/{}?signature=fake",
            sanitize_key(key)
        ))
    }

    async fn delete_object(&self, key: &str) -> Result<(), String> {
        if self.should_fail {
            return Err("Mock Storage Error: Simulation requested".to_string());
        }
        if let Ok(mut deleted) = self.deleted.lock() {
            deleted.push(sanitize_key(key));
        }
        Ok(())
    }
}

/// StorageState
///
/// The shared handle to the storage service stored in `AppState`.
pub type StorageState = Arc<dyn StorageService>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn sanitize_removes_traversal() {
        assert_eq!(sanitize_key("../../etc/passwd"), "etc/passwd");
        assert_eq!(sanitize_key("post_images//./a.png"), "post_images/a.png");
    }

    #[test]
    fn image_key_keeps_safe_extension() {
        let owner = Uuid::from_u128(1);
        let id = Uuid::from_u128(7);
        assert_eq!(
            post_image_key(owner, "Holiday.JPG", id),
            format!("post_images/{owner}/{id}.jpg")
        );
        assert_eq!(
            post_image_key(owner, "noext", id),
            format!("post_images/{owner}/{id}.bin")
        );
        assert_eq!(
            post_image_key(owner, "evil.p/hp", id),
            format!("post_images/{owner}/{id}.bin")
        );
    }

    #[test]
    fn image_keys_belong_to_their_uploader() {
        let alice = Uuid::from_u128(1);
        let mallory = Uuid::from_u128(2);
        let key = post_image_key(alice, "cat.png", Uuid::new_v4());

        assert!(is_owned_image_key(&key, alice));
        assert!(!is_owned_image_key(&key, mallory));
        assert!(!is_owned_image_key(&format!("post_images/{alice}/"), alice));
        assert!(!is_owned_image_key("post_images/cat.png", alice));
    }
}
