//! Remote key-value store backends.
//!
//! Defines the [`KvStore`] trait and provides [`CloudflareKv`], a client for
//! Cloudflare Workers KV, and [`MemoryKvStore`], an in-process store for
//! offline use and tests. Both operate on raw bytes; typed records do their
//! own (de)serialization.
//!
//! [`NamespaceResolver`] finds or creates the platform namespace inside an
//! account.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::error::{Result, SecretError};
use crate::types::{AccountContext, Namespace};

/// Page size used when listing namespaces.
const NAMESPACE_PAGE_SIZE: u32 = 100;

/// Async trait for remote store backends.
///
/// Every call is authenticated with the context's bearer token.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// List all namespaces in the account.
    async fn list_namespaces(&self, ctx: &AccountContext) -> Result<Vec<Namespace>>;

    /// Create a namespace. Not idempotent: calling twice creates two.
    /// [`NamespaceResolver`] lists first and tolerates duplicates that already
    /// exist; it does not prevent concurrent creation.
    async fn create_namespace(&self, ctx: &AccountContext, title: &str) -> Result<Namespace>;

    /// Store `value` under `key`, overwriting any previous value.
    async fn put(
        &self,
        ctx: &AccountContext,
        namespace_id: &str,
        key: &str,
        value: &[u8],
    ) -> Result<()>;

    /// Fetch the value under `key`. A missing key is [`SecretError::NotFound`].
    async fn get(&self, ctx: &AccountContext, namespace_id: &str, key: &str) -> Result<Vec<u8>>;

    /// Delete the value under `key`. Deleting a missing key succeeds.
    async fn delete(&self, ctx: &AccountContext, namespace_id: &str, key: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Cloudflare Workers KV
// ---------------------------------------------------------------------------

/// Cloudflare v4 response envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    total_pages: Option<u32>,
}

/// Cloudflare Workers KV client.
pub struct CloudflareKv {
    client: Client,
    api_base: Url,
}

impl CloudflareKv {
    /// Create a client against `api_base` (e.g. `https://api.cloudflare.com/client/v4`)
    /// with a fixed per-request timeout.
    pub fn new(api_base: &str, timeout: Duration) -> Result<Self> {
        let api_base = Url::parse(api_base)
            .map_err(|e| SecretError::Config(format!("invalid API base '{api_base}': {e}")))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SecretError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, api_base })
    }

    /// Build `{api_base}/accounts/{account}/storage/kv/namespaces/{segments...}`.
    ///
    /// Segments are percent-encoded, so logical keys may contain any character.
    fn url(&self, ctx: &AccountContext, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| SecretError::Config("API base cannot be a base URL".to_string()))?;
            path.pop_if_empty()
                .extend(["accounts", ctx.account_id(), "storage", "kv", "namespaces"])
                .extend(segments);
        }
        Ok(url)
    }

    async fn send(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
        ctx: &AccountContext,
    ) -> Result<reqwest::Response> {
        request
            .bearer_auth(ctx.token().expose_secret())
            .send()
            .await
            .map_err(|e| SecretError::remote(operation, e.to_string()))
    }

    /// Decode a JSON envelope, mapping non-success statuses to errors.
    async fn envelope<T: DeserializeOwned>(
        operation: &str,
        response: reqwest::Response,
    ) -> Result<Envelope<T>> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SecretError::remote(operation, e.to_string()))?;

        if !status.is_success() {
            return Err(status_error(operation, status, &body));
        }

        let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|e| {
            SecretError::remote(operation, format!("unexpected response body: {e}"))
        })?;

        if !envelope.success {
            return Err(SecretError::remote(operation, describe_errors(&envelope.errors)));
        }

        Ok(envelope)
    }
}

fn describe_errors(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "request was not successful".to_string();
    }
    errors
        .iter()
        .map(|e| format!("{} ({})", e.message, e.code))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Map an HTTP failure status to a [`SecretError`].
fn status_error(operation: &str, status: StatusCode, body: &str) -> SecretError {
    let message = serde_json::from_str::<Envelope<serde_json::Value>>(body)
        .map(|env| describe_errors(&env.errors))
        .unwrap_or_else(|_| format!("HTTP {}", status.as_u16()));

    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => SecretError::InvalidRequest {
            operation: operation.to_string(),
            message,
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SecretError::Unauthorized {
            operation: operation.to_string(),
            message,
        },
        _ => SecretError::remote(operation, format!("HTTP {}: {}", status.as_u16(), message)),
    }
}

#[async_trait]
impl KvStore for CloudflareKv {
    async fn list_namespaces(&self, ctx: &AccountContext) -> Result<Vec<Namespace>> {
        let mut namespaces = Vec::new();
        let mut page = 1u32;

        loop {
            let mut url = self.url(ctx, &[])?;
            url.query_pairs_mut()
                .append_pair("page", &page.to_string())
                .append_pair("per_page", &NAMESPACE_PAGE_SIZE.to_string());

            let response = self
                .send("list_namespaces", self.client.get(url), ctx)
                .await?;
            let envelope: Envelope<Vec<Namespace>> =
                Self::envelope("list_namespaces", response).await?;

            let total_pages = envelope
                .result_info
                .and_then(|info| info.total_pages)
                .unwrap_or(1);
            namespaces.extend(envelope.result.unwrap_or_default());

            if page >= total_pages {
                break;
            }
            page += 1;
        }

        debug!(account = ctx.account_id(), count = namespaces.len(), "listed namespaces");
        Ok(namespaces)
    }

    async fn create_namespace(&self, ctx: &AccountContext, title: &str) -> Result<Namespace> {
        let url = self.url(ctx, &[])?;
        let request = self
            .client
            .post(url)
            .json(&serde_json::json!({ "title": title }));

        let response = self.send("create_namespace", request, ctx).await?;
        let envelope: Envelope<Namespace> = Self::envelope("create_namespace", response).await?;

        envelope
            .result
            .ok_or_else(|| SecretError::remote("create_namespace", "response missing result"))
    }

    async fn put(
        &self,
        ctx: &AccountContext,
        namespace_id: &str,
        key: &str,
        value: &[u8],
    ) -> Result<()> {
        let url = self.url(ctx, &[namespace_id, "values", key])?;
        let request = self
            .client
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(value.to_vec());

        let response = self.send("put", request, ctx).await?;
        Self::envelope::<serde_json::Value>("put", response).await?;

        debug!(key, bytes = value.len(), "stored value");
        Ok(())
    }

    async fn get(&self, ctx: &AccountContext, namespace_id: &str, key: &str) -> Result<Vec<u8>> {
        let url = self.url(ctx, &[namespace_id, "values", key])?;
        let response = self.send("get", self.client.get(url), ctx).await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SecretError::NotFound {
                key: key.to_string(),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("get", status, &body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SecretError::remote("get", e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn delete(&self, ctx: &AccountContext, namespace_id: &str, key: &str) -> Result<()> {
        let url = self.url(ctx, &[namespace_id, "values", key])?;
        let response = self.send("delete", self.client.delete(url), ctx).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::envelope::<serde_json::Value>("delete", response).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryState {
    namespaces: HashMap<String, Vec<Namespace>>,
    values: HashMap<(String, String, String), Vec<u8>>,
    next_id: u64,
    lagged_reads: usize,
    failed_lists: usize,
    fail_writes: bool,
}

/// Per-operation call counts recorded by [`MemoryKvStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list_namespaces: usize,
    pub create_namespace: usize,
    pub put: usize,
    pub get: usize,
    pub delete: usize,
}

impl CallCounts {
    /// Total number of calls of any kind.
    pub fn total(&self) -> usize {
        self.list_namespaces + self.create_namespace + self.put + self.get + self.delete
    }
}

/// An in-process [`KvStore`], partitioned by account.
///
/// Propagation lag and outages can be simulated with
/// [`simulate_lag`](Self::simulate_lag), [`fail_lists`](Self::fail_lists) and
/// [`fail_writes`](Self::fail_writes).
#[derive(Default)]
pub struct MemoryKvStore {
    state: Mutex<MemoryState>,
    list_calls: AtomicUsize,
    create_calls: AtomicUsize,
    put_calls: AtomicUsize,
    get_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `reads` calls to [`KvStore::get`] report `NotFound`.
    pub fn simulate_lag(&self, reads: usize) {
        self.state.lock().lagged_reads = reads;
    }

    /// Make the next `calls` to [`KvStore::list_namespaces`] fail with a
    /// remote error.
    pub fn fail_lists(&self, calls: usize) {
        self.state.lock().failed_lists = calls;
    }

    /// Make every write (put, namespace creation) fail with a remote error.
    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// Snapshot of the calls made so far.
    pub fn calls(&self) -> CallCounts {
        CallCounts {
            list_namespaces: self.list_calls.load(Ordering::SeqCst),
            create_namespace: self.create_calls.load(Ordering::SeqCst),
            put: self.put_calls.load(Ordering::SeqCst),
            get: self.get_calls.load(Ordering::SeqCst),
            delete: self.delete_calls.load(Ordering::SeqCst),
        }
    }

    /// Read a stored value without counting the call or applying lag.
    pub fn peek(&self, account_id: &str, namespace_id: &str, key: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .values
            .get(&(account_id.to_string(), namespace_id.to_string(), key.to_string()))
            .cloned()
    }

    /// Namespaces currently in `account_id`, without counting the call.
    pub fn namespaces(&self, account_id: &str) -> Vec<Namespace> {
        self.state
            .lock()
            .namespaces
            .get(account_id)
            .cloned()
            .unwrap_or_default()
    }

    fn value_key(ctx: &AccountContext, namespace_id: &str, key: &str) -> (String, String, String) {
        (
            ctx.account_id().to_string(),
            namespace_id.to_string(),
            key.to_string(),
        )
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn list_namespaces(&self, ctx: &AccountContext) -> Result<Vec<Namespace>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        {
            let mut state = self.state.lock();
            if state.failed_lists > 0 {
                state.failed_lists -= 1;
                return Err(SecretError::remote("list_namespaces", "simulated outage"));
            }
        }
        Ok(self.namespaces(ctx.account_id()))
    }

    async fn create_namespace(&self, ctx: &AccountContext, title: &str) -> Result<Namespace> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        if state.fail_writes {
            return Err(SecretError::remote("create_namespace", "simulated write failure"));
        }

        state.next_id += 1;
        let namespace = Namespace {
            id: format!("ns-{:04}", state.next_id),
            title: title.to_string(),
        };
        state
            .namespaces
            .entry(ctx.account_id().to_string())
            .or_default()
            .push(namespace.clone());
        Ok(namespace)
    }

    async fn put(
        &self,
        ctx: &AccountContext,
        namespace_id: &str,
        key: &str,
        value: &[u8],
    ) -> Result<()> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        if state.fail_writes {
            return Err(SecretError::remote("put", "simulated write failure"));
        }
        state
            .values
            .insert(Self::value_key(ctx, namespace_id, key), value.to_vec());
        Ok(())
    }

    async fn get(&self, ctx: &AccountContext, namespace_id: &str, key: &str) -> Result<Vec<u8>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        if state.lagged_reads > 0 {
            state.lagged_reads -= 1;
            return Err(SecretError::NotFound {
                key: key.to_string(),
            });
        }
        state
            .values
            .get(&Self::value_key(ctx, namespace_id, key))
            .cloned()
            .ok_or_else(|| SecretError::NotFound {
                key: key.to_string(),
            })
    }

    async fn delete(&self, ctx: &AccountContext, namespace_id: &str, key: &str) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.state
            .lock()
            .values
            .remove(&Self::value_key(ctx, namespace_id, key));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Namespace resolution
// ---------------------------------------------------------------------------

/// Finds or creates the platform namespace, memoizing the id per account.
///
/// There is no distributed lock: two first-run processes can both create a
/// namespace. When several namespaces share the title, the smallest id wins so
/// every process settles on the same one.
pub struct NamespaceResolver {
    store: Arc<dyn KvStore>,
    title: String,
    resolved: RwLock<HashMap<String, String>>,
}

impl NamespaceResolver {
    pub fn new(store: Arc<dyn KvStore>, title: impl Into<String>) -> Self {
        Self {
            store,
            title: title.into(),
            resolved: RwLock::new(HashMap::new()),
        }
    }

    /// Namespace title this resolver looks for.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Return the existing namespace id for `ctx`'s account without creating
    /// one. `Ok(None)` means the listing succeeded and no namespace has the
    /// title yet.
    pub async fn lookup(&self, ctx: &AccountContext) -> Result<Option<String>> {
        if let Some(id) = self.resolved.read().get(ctx.account_id()) {
            return Ok(Some(id.clone()));
        }

        let existing = self
            .store
            .list_namespaces(ctx)
            .await?
            .into_iter()
            .filter(|ns| ns.title == self.title)
            .map(|ns| ns.id)
            .min();

        if let Some(id) = &existing {
            debug!(account = ctx.account_id(), namespace = %id, "resolved namespace");
            self.resolved
                .write()
                .insert(ctx.account_id().to_string(), id.clone());
        }
        Ok(existing)
    }

    /// Return the namespace id for `ctx`'s account, creating the namespace if needed.
    pub async fn ensure(&self, ctx: &AccountContext) -> Result<String> {
        let id = match self.lookup(ctx).await? {
            Some(id) => id,
            None => {
                let created = self.store.create_namespace(ctx, &self.title).await?;
                info!(
                    account = ctx.account_id(),
                    namespace = %created.id,
                    title = %self.title,
                    "created namespace"
                );
                created.id
            }
        };

        self.resolved
            .write()
            .insert(ctx.account_id().to_string(), id.clone());
        Ok(id)
    }

    /// Forget the memoized id for an account.
    pub fn forget(&self, account_id: &str) {
        self.resolved.write().remove(account_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_bytes, body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ctx() -> AccountContext {
        AccountContext::new("tok-abc", "acct-1")
    }

    fn client(server: &MockServer) -> CloudflareKv {
        CloudflareKv::new(&format!("{}/client/v4", server.uri()), Duration::from_secs(5)).unwrap()
    }

    const NS_PATH: &str = "/client/v4/accounts/acct-1/storage/kv/namespaces";

    #[tokio::test]
    async fn test_cloudflare_list_namespaces_paginates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(NS_PATH))
            .and(query_param("page", "1"))
            .and(header("authorization", "Bearer tok-abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "errors": [],
                "result": [{ "id": "ns-a", "title": "Other" }],
                "result_info": { "page": 1, "total_pages": 2 }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(NS_PATH))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "errors": [],
                "result": [{ "id": "ns-b", "title": "Xanthus" }],
                "result_info": { "page": 2, "total_pages": 2 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let namespaces = client(&server).list_namespaces(&ctx()).await.unwrap();
        let ids: Vec<&str> = namespaces.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["ns-a", "ns-b"]);
    }

    #[tokio::test]
    async fn test_cloudflare_create_namespace() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(NS_PATH))
            .and(body_json(serde_json::json!({ "title": "Xanthus" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "errors": [],
                "result": { "id": "ns-new", "title": "Xanthus" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ns = client(&server)
            .create_namespace(&ctx(), "Xanthus")
            .await
            .unwrap();
        assert_eq!(ns.id, "ns-new");
    }

    #[tokio::test]
    async fn test_cloudflare_put_and_get_value() {
        let server = MockServer::start().await;
        let value_path = format!("{NS_PATH}/ns-1/values/config:hetzner:api_key");
        Mock::given(method("PUT"))
            .and(path(value_path.as_str()))
            .and(body_bytes(b"payload".to_vec()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true, "errors": [], "result": null
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(value_path.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let kv = client(&server);
        kv.put(&ctx(), "ns-1", "config:hetzner:api_key", b"payload")
            .await
            .unwrap();
        let value = kv.get(&ctx(), "ns-1", "config:hetzner:api_key").await.unwrap();
        assert_eq!(value, b"payload");
    }

    #[tokio::test]
    async fn test_cloudflare_get_missing_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "success": false,
                "errors": [{ "code": 10009, "message": "get: 'key not found'" }],
                "result": null
            })))
            .mount(&server)
            .await;

        let result = client(&server).get(&ctx(), "ns-1", "missing").await;
        assert!(matches!(result, Err(SecretError::NotFound { key }) if key == "missing"));
    }

    #[tokio::test]
    async fn test_cloudflare_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{NS_PATH}/ns-1/values/bad")))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "success": false,
                "errors": [{ "code": 10019, "message": "invalid key" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{NS_PATH}/ns-1/values/denied")))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{NS_PATH}/ns-1/values/flaky")))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let kv = client(&server);
        let bad = kv.get(&ctx(), "ns-1", "bad").await.unwrap_err();
        assert!(matches!(bad, SecretError::InvalidRequest { .. }));
        assert!(bad.to_string().contains("invalid key"));

        let denied = kv.get(&ctx(), "ns-1", "denied").await.unwrap_err();
        assert!(matches!(denied, SecretError::Unauthorized { .. }));

        let flaky = kv.get(&ctx(), "ns-1", "flaky").await.unwrap_err();
        assert!(matches!(flaky, SecretError::Remote { .. }));
        assert!(flaky.is_retryable());
    }

    #[tokio::test]
    async fn test_cloudflare_unsuccessful_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "errors": [{ "code": 10014, "message": "namespace limit reached" }]
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .create_namespace(&ctx(), "Xanthus")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("namespace limit reached"));
    }

    #[tokio::test]
    async fn test_cloudflare_timeout_is_remote_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let kv = CloudflareKv::new(&server.uri(), Duration::from_millis(50)).unwrap();
        let err = kv.get(&ctx(), "ns-1", "slow").await.unwrap_err();
        assert!(matches!(err, SecretError::Remote { .. }));
    }

    #[test]
    fn test_cloudflare_rejects_invalid_base() {
        assert!(matches!(
            CloudflareKv::new("not a url", Duration::from_secs(1)),
            Err(SecretError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_store_partitions_accounts() {
        let store = MemoryKvStore::new();
        let a = AccountContext::new("tok", "acct-a");
        let b = AccountContext::new("tok", "acct-b");

        store.put(&a, "ns", "key", b"a").await.unwrap();
        assert_eq!(store.get(&a, "ns", "key").await.unwrap(), b"a");
        assert!(matches!(
            store.get(&b, "ns", "key").await,
            Err(SecretError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_memory_store_simulated_lag() {
        let store = MemoryKvStore::new();
        store.put(&ctx(), "ns", "key", b"v").await.unwrap();
        store.simulate_lag(2);

        assert!(store.get(&ctx(), "ns", "key").await.is_err());
        assert!(store.get(&ctx(), "ns", "key").await.is_err());
        assert_eq!(store.get(&ctx(), "ns", "key").await.unwrap(), b"v");
        assert_eq!(store.calls().get, 3);
    }

    #[tokio::test]
    async fn test_resolver_creates_once_then_memoizes() {
        let store = Arc::new(MemoryKvStore::new());
        let resolver = NamespaceResolver::new(store.clone(), "Xanthus");

        let first = resolver.ensure(&ctx()).await.unwrap();
        let second = resolver.ensure(&ctx()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.calls().create_namespace, 1);
        assert_eq!(store.calls().list_namespaces, 1);
        assert_eq!(store.namespaces("acct-1")[0].title, "Xanthus");
    }

    #[tokio::test]
    async fn test_resolver_reuses_existing_namespace() {
        let store = Arc::new(MemoryKvStore::new());
        store.create_namespace(&ctx(), "Unrelated").await.unwrap();
        let existing = store.create_namespace(&ctx(), "Xanthus").await.unwrap();

        let resolver = NamespaceResolver::new(store.clone(), "Xanthus");
        assert_eq!(resolver.ensure(&ctx()).await.unwrap(), existing.id);
        assert_eq!(store.calls().create_namespace, 2);
    }

    #[tokio::test]
    async fn test_resolver_picks_smallest_duplicate() {
        let store = Arc::new(MemoryKvStore::new());
        let first = store.create_namespace(&ctx(), "Xanthus").await.unwrap();
        store.create_namespace(&ctx(), "Xanthus").await.unwrap();

        // Two independent processes must agree.
        let a = NamespaceResolver::new(store.clone(), "Xanthus");
        let b = NamespaceResolver::new(store.clone(), "Xanthus");
        assert_eq!(a.ensure(&ctx()).await.unwrap(), first.id);
        assert_eq!(b.ensure(&ctx()).await.unwrap(), first.id);
    }

    #[tokio::test]
    async fn test_resolver_forget_relists() {
        let store = Arc::new(MemoryKvStore::new());
        let resolver = NamespaceResolver::new(store.clone(), "Xanthus");
        resolver.ensure(&ctx()).await.unwrap();
        resolver.forget("acct-1");
        resolver.ensure(&ctx()).await.unwrap();

        assert_eq!(store.calls().list_namespaces, 2);
        assert_eq!(store.calls().create_namespace, 1);
    }

    #[tokio::test]
    async fn test_resolver_lookup_never_creates() {
        let store = Arc::new(MemoryKvStore::new());
        let resolver = NamespaceResolver::new(store.clone(), "Xanthus");

        assert_eq!(resolver.lookup(&ctx()).await.unwrap(), None);
        assert_eq!(store.calls().create_namespace, 0);

        let id = resolver.ensure(&ctx()).await.unwrap();
        assert_eq!(resolver.lookup(&ctx()).await.unwrap(), Some(id));
    }

    #[tokio::test]
    async fn test_resolver_list_failure_is_not_memoized() {
        let store = Arc::new(MemoryKvStore::new());
        let existing = store.create_namespace(&ctx(), "Xanthus").await.unwrap();
        store.fail_lists(1);

        let resolver = NamespaceResolver::new(store.clone(), "Xanthus");
        let err = resolver.ensure(&ctx()).await.unwrap_err();
        assert!(matches!(err, SecretError::Remote { .. }));
        assert_eq!(store.calls().create_namespace, 1);

        assert_eq!(resolver.ensure(&ctx()).await.unwrap(), existing.id);
        assert_eq!(store.calls().create_namespace, 1);
    }
}
