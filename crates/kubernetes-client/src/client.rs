//! Kubernetes API client
//!
//! Plain request/response wrappers for the CRUD verbs plus the self-healing
//! watch entry points.

use crate::error::KubernetesError;
use crate::query::with_query_values;
use crate::transport::HttpTransport;
use crate::watch::supervisor::WatchSupervisor;
use crate::watch::{WatchControl, WatchOptions};
use reqwest::Method;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Kubernetes API client
///
/// Cheap to clone: clones share the same transport, so several watches can
/// run concurrently (one task each) over one connection pool.
#[derive(Clone)]
pub struct KubernetesClient {
    transport: Arc<dyn HttpTransport>,
    watch_options: WatchOptions,
}

impl std::fmt::Debug for KubernetesClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubernetesClient")
            .field("watch_options", &self.watch_options)
            .finish_non_exhaustive()
    }
}

impl KubernetesClient {
    /// Create a client over a transport
    pub fn new(transport: impl HttpTransport + 'static) -> Self {
        Self::from_shared(Arc::new(transport))
    }

    /// Create a client over an already shared transport
    pub fn from_shared(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            watch_options: WatchOptions::default(),
        }
    }

    /// Replace the watch supervisor options
    #[must_use]
    pub fn with_watch_options(mut self, watch_options: WatchOptions) -> Self {
        self.watch_options = watch_options;
        self
    }

    /// Get the watch supervisor options
    pub fn watch_options(&self) -> &WatchOptions {
        &self.watch_options
    }

    /// GET `uri` with optional query values
    pub async fn get(&self, uri: &str, query: &[(&str, &str)]) -> Result<Value, KubernetesError> {
        self.request(Method::GET, &with_query_values(uri, query), None)
            .await
    }

    /// POST a JSON body to `uri`
    pub async fn post(
        &self,
        uri: &str,
        body: Value,
        query: &[(&str, &str)],
    ) -> Result<Value, KubernetesError> {
        self.request(Method::POST, &with_query_values(uri, query), Some(body))
            .await
    }

    /// PUT a JSON body to `uri`
    pub async fn put(
        &self,
        uri: &str,
        body: Value,
        query: &[(&str, &str)],
    ) -> Result<Value, KubernetesError> {
        self.request(Method::PUT, &with_query_values(uri, query), Some(body))
            .await
    }

    /// PATCH `uri` with a JSON body
    pub async fn patch(
        &self,
        uri: &str,
        body: Value,
        query: &[(&str, &str)],
    ) -> Result<Value, KubernetesError> {
        self.request(Method::PATCH, &with_query_values(uri, query), Some(body))
            .await
    }

    /// DELETE `uri` with optional query values
    pub async fn delete(&self, uri: &str, query: &[(&str, &str)]) -> Result<Value, KubernetesError> {
        self.request(Method::DELETE, &with_query_values(uri, query), None)
            .await
    }

    /// Send a request and decode the JSON response
    ///
    /// A `null` or empty-array body is sent as `{}`: the API server expects
    /// objects.
    ///
    /// # Returns
    /// * `Ok(Value)` - The decoded response body
    /// * `Err(KubernetesError::Request)` - Transport failure or non-2xx status
    /// * `Err(KubernetesError::Response)` - The body is not valid JSON
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Result<Value, KubernetesError> {
        let body = body.map(object_body);
        debug!("{} {}", method, uri);

        let response = self
            .transport
            .request(method.clone(), uri, body.as_ref())
            .await
            .map_err(|source| KubernetesError::Request {
                method,
                uri: uri.to_string(),
                source,
            })?;

        serde_json::from_slice(&response).map_err(KubernetesError::Response)
    }

    /// Watch a resource collection until `on_event` returns a stop signal
    ///
    /// `on_event` may return `bool` (`false` stops), `()` (never stops) or a
    /// [`WatchControl`]. Stream failures are logged and the watch restarts
    /// after the configured delay; this call only returns on stop.
    pub async fn watch<F, R>(&self, endpoint: &str, mut on_event: F)
    where
        F: FnMut(Value) -> R + Send,
        R: Into<WatchControl>,
    {
        let mut on_event = move |event: Value| -> WatchControl { on_event(event).into() };
        WatchSupervisor::new(self.transport.as_ref(), endpoint, &self.watch_options)
            .run(&mut on_event, None)
            .await;
    }

    /// Like [`watch`](Self::watch), seeding each attempt with a snapshot
    ///
    /// The collection is fetched first and handed to `on_snapshot`; streaming
    /// then starts at the snapshot's `metadata.resourceVersion`.
    pub async fn watch_with_snapshot<F, R, S>(&self, endpoint: &str, mut on_event: F, mut on_snapshot: S)
    where
        F: FnMut(Value) -> R + Send,
        R: Into<WatchControl>,
        S: FnMut(Value) + Send,
    {
        let mut on_event = move |event: Value| -> WatchControl { on_event(event).into() };
        WatchSupervisor::new(self.transport.as_ref(), endpoint, &self.watch_options)
            .run(&mut on_event, Some(&mut on_snapshot))
            .await;
    }
}

fn object_body(body: Value) -> Value {
    match body {
        Value::Null => Value::Object(Map::new()),
        Value::Array(items) if items.is_empty() => Value::Object(Map::new()),
        other => other,
    }
}
