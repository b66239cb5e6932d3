//! Object-storage gateway client.
//!
//! Artifacts are uploaded with a single streaming PUT to
//! `<endpoint>/<bucket>/<object>`, authenticated by a static access-key
//! header pair the gateway validates.

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use reqwest::Client;
use tokio_util::io::ReaderStream;
use tracing::info;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const UPLOAD_TIMEOUT_SECS: u64 = 600;

pub struct ObjectStoreClient {
    http: Client,
    endpoint: String,
    bucket: String,
    access_key: String,
    secret_key: String,
}

impl ObjectStoreClient {
    pub fn new(endpoint: &str, access_key: &str, secret_key: &str, bucket: &str) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(UPLOAD_TIMEOUT_SECS))
            .build()
            .map_err(|e| anyhow!("failed to create HTTP client: {}", e))?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
        })
    }

    /// Upload a local file under the given object name. Extra metadata
    /// headers are passed through to the gateway unchanged.
    pub async fn upload_file(
        &self,
        path: &Path,
        object: &str,
        metadata: &[(String, String)],
    ) -> Result<()> {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("failed to open artifact {}", path.display()))?;
        let size_bytes = file
            .metadata()
            .await
            .with_context(|| format!("failed to stat artifact {}", path.display()))?
            .len();

        let url = format!("{}/{}/{}", self.endpoint, self.bucket, object);
        info!(
            "uploading {} ({} bytes) to {}/{}",
            path.display(),
            size_bytes,
            self.bucket,
            object
        );

        let mut request = self
            .http
            .put(&url)
            .header("x-access-key", &self.access_key)
            .header("x-secret-key", &self.secret_key)
            .header(reqwest::header::CONTENT_LENGTH, size_bytes);
        for (key, value) in metadata {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request
            .body(reqwest::Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await
            .with_context(|| format!("upload request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(200).collect();
            bail!("upload to {} failed with {}: {}", url, status, excerpt);
        }

        info!("upload completed: {}/{}", self.bucket, object);
        Ok(())
    }
}

/// Derive the object name for an artifact.
///
/// With a prefix, the name is `<prefix>/<file>` where the prefix keeps no
/// leading slash and contributes exactly one separator. Without one, a
/// timestamped `backup-...` name is generated. Doubled slashes are
/// collapsed; gateway object names never start with `/`.
pub fn object_name(prefix: &str, file_name: &str) -> String {
    let mut name = if prefix.is_empty() {
        let timestamp = Utc::now().format("%Y%m%d-%H%M%S");
        format!("backup-{}-{}", timestamp, file_name)
    } else {
        let mut joined = prefix.trim_start_matches('/').to_string();
        if !joined.ends_with('/') {
            joined.push('/');
        }
        joined.push_str(file_name);
        joined
    };

    name = name.trim_start_matches('/').to_string();
    while name.contains("//") {
        name = name.replace("//", "/");
    }
    if name.is_empty() {
        name = file_name.to_string();
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_joins_with_single_separator() {
        assert_eq!(object_name("nightly", "a.tar.gz"), "nightly/a.tar.gz");
        assert_eq!(object_name("nightly/", "a.tar.gz"), "nightly/a.tar.gz");
        assert_eq!(object_name("/nightly", "a.tar.gz"), "nightly/a.tar.gz");
        assert_eq!(
            object_name("//nightly//deep/", "a.tar.gz"),
            "nightly/deep/a.tar.gz"
        );
    }

    #[test]
    fn empty_prefix_generates_timestamped_name() {
        let name = object_name("", "a.tar.gz");
        assert!(name.starts_with("backup-"));
        assert!(name.ends_with("-a.tar.gz"));
    }
}
