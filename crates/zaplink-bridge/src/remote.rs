//! # Remote Object Store & Cloud Credential Store
//!
//! Cloud deployments mirror the local credential directory to a remote
//! object store so a restarted or relocated process can resume the session
//! without re-pairing.
//!
//! ## Sync Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Cloud Credential Sync                              │
//! │                                                                         │
//! │  load:                              save:                               │
//! │  ┌───────────┐  1. list/download    ┌───────────┐  1. write (must      │
//! │  │  remote   │ ──────────────────►  │   local   │     succeed)         │
//! │  │  bucket   │     (best effort)    │ directory │                      │
//! │  └───────────┘                      └─────┬─────┘                      │
//! │        ▲                                  │ 2. upload each file        │
//! │        └──────────────────────────────────┘    (log-and-continue)      │
//! │                                                                         │
//! │  • Local state is authoritative for the live process                   │
//! │  • Remote exists only for restart/relocation                           │
//! │  • No transaction between the two: a crash between write and upload    │
//! │    leaves them diverged until the next successful sync                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::RemoteSettings;
use crate::creds::{sanitize_name, CredentialStore, FileStore, SessionState};
use crate::error::{BridgeError, BridgeResult};

// =============================================================================
// Remote Store (HTTP object API)
// =============================================================================

/// Client for a bucket on an HTTP object store.
///
/// Object names map 1:1 to credential file names:
/// - `GET  {endpoint}/{bucket}/`        → JSON array of object names
/// - `GET  {endpoint}/{bucket}/{name}`  → object bytes
/// - `PUT  {endpoint}/{bucket}/{name}`  → store object bytes
///
/// An optional bearer token covers deployments where the platform does not
/// inject ambient credentials at the network layer.
pub struct RemoteStore {
    http: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl RemoteStore {
    /// Creates a store for the configured endpoint and bucket.
    pub fn new(settings: &RemoteSettings) -> BridgeResult<Self> {
        let endpoint = Url::parse(&settings.endpoint)?;
        let base = endpoint
            .join(&format!("{}/", settings.bucket.trim_matches('/')))
            .map_err(BridgeError::from)?;

        Ok(RemoteStore {
            http: reqwest::Client::new(),
            base,
            token: settings.token.clone(),
        })
    }

    fn object_url(&self, name: &str) -> BridgeResult<Url> {
        self.base.join(name).map_err(BridgeError::from)
    }

    fn with_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Lists object names in the bucket. A missing bucket (404) lists as
    /// empty: it just means no session has ever been synced.
    pub async fn list(&self) -> BridgeResult<Vec<String>> {
        let response = self
            .with_auth(self.http.get(self.base.clone()))
            .send()
            .await
            .map_err(|e| BridgeError::ConnectionFailed(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(bucket = %self.base, "Bucket not found, treating as empty");
            return Ok(Vec::new());
        }

        let response = response
            .error_for_status()
            .map_err(|e| BridgeError::ConnectionFailed(e.to_string()))?;

        response
            .json::<Vec<String>>()
            .await
            .map_err(|e| BridgeError::SerializationFailed(e.to_string()))
    }

    /// Downloads one object.
    pub async fn download(&self, name: &str) -> BridgeResult<Vec<u8>> {
        let url = self.object_url(name)?;
        let response = self
            .with_auth(self.http.get(url))
            .send()
            .await
            .map_err(|e| BridgeError::ConnectionFailed(e.to_string()))?
            .error_for_status()
            .map_err(|e| BridgeError::ConnectionFailed(e.to_string()))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BridgeError::ConnectionFailed(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    /// Uploads one object.
    pub async fn upload(&self, name: &str, bytes: Vec<u8>) -> BridgeResult<()> {
        let url = self.object_url(name)?;
        self.with_auth(self.http.put(url))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(bytes)
            .send()
            .await
            .map_err(|e| BridgeError::ConnectionFailed(e.to_string()))?
            .error_for_status()
            .map_err(|e| BridgeError::ConnectionFailed(e.to_string()))?;
        Ok(())
    }
}

// =============================================================================
// Cloud Credential Store
// =============================================================================

/// Credential store that mirrors a local [`FileStore`] to a [`RemoteStore`].
///
/// Local durability comes first: `save` fails only if the local write
/// fails. Remote sync failures are logged and swallowed; they must never
/// abort message delivery or crash the process.
pub struct CloudStore {
    local: FileStore,
    remote: Arc<RemoteStore>,
}

impl CloudStore {
    pub fn new(local: FileStore, remote: RemoteStore) -> Self {
        CloudStore {
            local,
            remote: Arc::new(remote),
        }
    }

    /// Best-effort hydration of the local directory from the remote bucket.
    async fn hydrate(&self) {
        let names = match self.remote.list().await {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "Remote listing failed, starting from local state");
                return;
            }
        };

        if names.is_empty() {
            debug!("No remote session objects, fresh session or local-only state");
            return;
        }

        if let Err(e) = tokio::fs::create_dir_all(self.local.dir()).await {
            warn!(error = %e, "Could not create credential directory for hydration");
            return;
        }

        let mut downloaded = 0usize;
        for name in &names {
            match self.remote.download(name).await {
                Ok(bytes) => {
                    let path = self.local.dir().join(sanitize_name(name));
                    if let Err(e) = tokio::fs::write(&path, bytes).await {
                        warn!(object = %name, error = %e, "Failed to write downloaded object");
                    } else {
                        downloaded += 1;
                    }
                }
                Err(e) => {
                    warn!(object = %name, error = %e, "Failed to download session object");
                }
            }
        }

        info!(downloaded, total = names.len(), "Remote session state hydrated");
    }

    /// Best-effort upload of the full state to the remote bucket.
    async fn mirror(&self, state: &SessionState) {
        let mut uploaded = 0usize;
        for (name, value) in state.files() {
            let bytes = match serde_json::to_vec_pretty(value) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(object = %name, error = %e, "Failed to serialize object for upload");
                    continue;
                }
            };
            match self.remote.upload(&sanitize_name(name), bytes).await {
                Ok(()) => uploaded += 1,
                Err(e) => {
                    warn!(object = %name, error = %e, "Failed to upload session object");
                }
            }
        }
        debug!(uploaded, total = state.len(), "Remote session state mirrored");
    }
}

#[async_trait]
impl CredentialStore for CloudStore {
    async fn load(&self) -> BridgeResult<SessionState> {
        self.hydrate().await;
        self.local.load().await
    }

    async fn save(&self, state: &SessionState) -> BridgeResult<()> {
        // Durability before remote sync: the local write must succeed.
        self.local.save(state).await?;
        self.mirror(state).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(server: &MockServer) -> RemoteSettings {
        RemoteSettings {
            enabled: true,
            endpoint: server.uri(),
            bucket: "sessions".into(),
            token: None,
        }
    }

    fn sample_state() -> SessionState {
        let mut state = SessionState::new();
        state.insert("creds.json", json!({"noiseKey": "abc"}));
        state
    }

    #[tokio::test]
    async fn test_remote_list_and_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sessions/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["creds.json"])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sessions/creds.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"noiseKey\":\"abc\"}"))
            .mount(&server)
            .await;

        let remote = RemoteStore::new(&settings(&server)).unwrap();
        assert_eq!(remote.list().await.unwrap(), vec!["creds.json".to_string()]);
        let bytes = remote.download("creds.json").await.unwrap();
        assert_eq!(bytes, b"{\"noiseKey\":\"abc\"}");
    }

    #[tokio::test]
    async fn test_remote_missing_bucket_lists_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sessions/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let remote = RemoteStore::new(&settings(&server)).unwrap();
        assert!(remote.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cloud_save_survives_upload_failure() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = CloudStore::new(
            FileStore::new(dir.path().join("auth")),
            RemoteStore::new(&settings(&server)).unwrap(),
        );

        // Upload fails, but save succeeds and the local file exists
        store.save(&sample_state()).await.unwrap();
        assert!(dir.path().join("auth").join("creds.json").exists());
    }

    #[tokio::test]
    async fn test_cloud_load_hydrates_from_remote() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sessions/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["creds.json"])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sessions/creds.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"noiseKey\":\"abc\"}"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = CloudStore::new(
            FileStore::new(dir.path().join("auth")),
            RemoteStore::new(&settings(&server)).unwrap(),
        );

        let state = store.load().await.unwrap();
        assert_eq!(state.get("creds.json"), Some(&json!({"noiseKey": "abc"})));
    }

    #[tokio::test]
    async fn test_cloud_load_survives_remote_outage() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let local = FileStore::new(dir.path().join("auth"));
        local.save(&sample_state()).await.unwrap();

        let store = CloudStore::new(
            FileStore::new(dir.path().join("auth")),
            RemoteStore::new(&settings(&server)).unwrap(),
        );

        // Remote is down; local state still loads
        let state = store.load().await.unwrap();
        assert_eq!(state, sample_state());
    }
}
