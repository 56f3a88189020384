//! One watch attempt: optional snapshot, then a single streaming GET.

use crate::error::KubernetesError;
use crate::query::with_query_values;
use crate::transport::HttpTransport;
use crate::watch::event::resource_version;
use crate::watch::framer::{FrameError, NdjsonFramer};
use crate::watch::{EventCallback, SnapshotCallback, WatchControl};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info};

/// How a session that did not fail came to an end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionOutcome {
    /// The event callback asked to stop
    Stopped,
    /// The server closed the stream
    StreamEnded,
}

pub(crate) struct WatchSession<'a> {
    transport: &'a dyn HttpTransport,
    endpoint: &'a str,
    resource_version: Option<String>,
    last_seen: Option<String>,
    saw_error_event: bool,
    delivered: usize,
}

impl<'a> WatchSession<'a> {
    /// A session starting at `resource_version`, or at the current server
    /// state (after an optional snapshot) when `None`
    pub(crate) fn new(
        transport: &'a dyn HttpTransport,
        endpoint: &'a str,
        resource_version: Option<String>,
    ) -> Self {
        Self {
            transport,
            endpoint,
            resource_version,
            last_seen: None,
            saw_error_event: false,
            delivered: 0,
        }
    }

    /// Token to resume from after this session, if resuming is safe
    pub(crate) fn resume_token(&self) -> Option<String> {
        if self.saw_error_event {
            return None;
        }
        self.last_seen.clone().or_else(|| self.resource_version.clone())
    }

    /// Number of records handed to the event callback
    pub(crate) fn delivered(&self) -> usize {
        self.delivered
    }

    pub(crate) fn stream_uri(&self) -> String {
        match &self.resource_version {
            Some(version) => with_query_values(
                self.endpoint,
                &[("watch", "1"), ("resourceVersion", version.as_str())],
            ),
            None => with_query_values(self.endpoint, &[("watch", "1")]),
        }
    }

    pub(crate) async fn run(
        &mut self,
        on_event: &mut EventCallback<'_>,
        on_snapshot: Option<&mut SnapshotCallback<'_>>,
    ) -> Result<SessionOutcome, KubernetesError> {
        if self.resource_version.is_none() {
            if let Some(on_snapshot) = on_snapshot {
                self.resource_version = Some(self.initialize(on_snapshot).await?);
            }
        }

        info!(endpoint = %self.endpoint, "Starting watcher");

        let uri = self.stream_uri();
        let body = self
            .transport
            .stream(&uri)
            .await
            .map_err(|source| KubernetesError::Request {
                method: Method::GET,
                uri: uri.clone(),
                source,
            })?;

        let mut framer = NdjsonFramer::new(body);
        while let Some(record) = framer.next_event().await {
            let event = record.map_err(|e| match e {
                FrameError::Transport(source) => KubernetesError::Request {
                    method: Method::GET,
                    uri: uri.clone(),
                    source,
                },
                FrameError::Decode { raw, source } => KubernetesError::StreamDecode { raw, source },
            })?;

            self.observe(&event);
            self.delivered += 1;

            if on_event(event) == WatchControl::Stop {
                debug!(endpoint = %self.endpoint, "Watch stopped by event callback");
                return Ok(SessionOutcome::Stopped);
            }
        }

        Ok(SessionOutcome::StreamEnded)
    }

    /// Fetch the collection, hand it to the snapshot callback and return its
    /// `metadata.resourceVersion`
    async fn initialize(
        &self,
        on_snapshot: &mut SnapshotCallback<'_>,
    ) -> Result<String, KubernetesError> {
        info!(endpoint = %self.endpoint, "Initializing watch base resourceVersion");

        let body = self
            .transport
            .request(Method::GET, self.endpoint, None)
            .await
            .map_err(|source| KubernetesError::Request {
                method: Method::GET,
                uri: self.endpoint.to_string(),
                source,
            })?;
        let snapshot: Value = serde_json::from_slice(&body).map_err(KubernetesError::Response)?;

        let version = resource_version(&snapshot)
            .ok_or_else(|| {
                KubernetesError::ResponseShape(format!(
                    "snapshot of `{}` has no metadata.resourceVersion",
                    self.endpoint
                ))
            })?
            .to_string();

        on_snapshot(snapshot);
        Ok(version)
    }

    fn observe(&mut self, event: &Value) {
        if event.get("type").and_then(Value::as_str) == Some("ERROR") {
            self.saw_error_event = true;
        }
        if let Some(version) = event.get("object").and_then(resource_version) {
            self.last_seen = Some(version.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockChunk, MockReply, MockTransport};
    use serde_json::json;

    const SERVICES: &str = "/api/v1/namespaces/default/services";

    #[tokio::test]
    async fn test_stream_uri() {
        let transport = MockTransport::new();

        let session = WatchSession::new(&transport, SERVICES, None);
        assert_eq!(session.stream_uri(), format!("{}?watch=1", SERVICES));

        let session = WatchSession::new(&transport, SERVICES, Some("0002".to_string()));
        assert_eq!(
            session.stream_uri(),
            format!("{}?watch=1&resourceVersion=0002", SERVICES)
        );
    }

    #[tokio::test]
    async fn test_stop_ends_session_without_further_reads() {
        let transport = MockTransport::new();
        transport.stream_chunks(
            format!("{}?watch=1", SERVICES),
            vec![
                MockChunk::data("{\"type\":\"ADDED\",\"object\":{}}\n{\"type\":\"MODIFIED\",\"object\":{}}\n"),
                MockChunk::data("{\"type\":\"DELETED\",\"object\":{}}\n"),
            ],
        );

        let mut seen = Vec::new();
        let mut on_event = |event: Value| {
            seen.push(event);
            WatchControl::from(seen.len() < 2)
        };

        let mut session = WatchSession::new(&transport, SERVICES, None);
        let outcome = session.run(&mut on_event, None).await.unwrap();

        assert_eq!(outcome, SessionOutcome::Stopped);
        assert_eq!(seen.len(), 2);
        assert_eq!(transport.chunks_read(), 1);
    }

    #[tokio::test]
    async fn test_server_close_is_stream_ended() {
        let transport = MockTransport::new();
        transport.stream_lines(format!("{}?watch=1", SERVICES), &["{\"type\":\"ADDED\",\"object\":{}}"]);

        let mut count = 0;
        let mut on_event = |_: Value| {
            count += 1;
            WatchControl::Continue
        };

        let mut session = WatchSession::new(&transport, SERVICES, None);
        let outcome = session.run(&mut on_event, None).await.unwrap();

        assert_eq!(outcome, SessionOutcome::StreamEnded);
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_snapshot_seeds_resource_version() {
        let transport = MockTransport::new();
        transport.respond(
            Method::GET,
            SERVICES,
            r#"{"metadata":{"resourceVersion":"42"},"items":[]}"#,
        );
        transport.stream_lines(
            format!("{}?watch=1&resourceVersion=42", SERVICES),
            &[r#"{"type":"MODIFIED","object":{}}"#],
        );

        let mut snapshots = Vec::new();
        let mut on_snapshot = |snapshot: Value| snapshots.push(snapshot);
        let mut on_event = |_: Value| WatchControl::Stop;

        let mut session = WatchSession::new(&transport, SERVICES, None);
        let outcome = session
            .run(&mut on_event, Some(&mut on_snapshot))
            .await
            .unwrap();

        assert_eq!(outcome, SessionOutcome::Stopped);
        assert_eq!(snapshots, vec![json!({"metadata": {"resourceVersion": "42"}, "items": []})]);
        assert_eq!(session.resume_token(), Some("42".to_string()));
    }

    #[tokio::test]
    async fn test_snapshot_without_resource_version_is_response_error() {
        let transport = MockTransport::new();
        transport.respond(Method::GET, SERVICES, r#"{"items":[]}"#);

        let mut snapshot_calls = 0;
        let mut on_snapshot = |_: Value| snapshot_calls += 1;
        let mut on_event = |_: Value| WatchControl::Continue;

        let mut session = WatchSession::new(&transport, SERVICES, None);
        let err = session
            .run(&mut on_event, Some(&mut on_snapshot))
            .await
            .unwrap_err();

        assert_eq!(err.category(), "ResponseError");
        assert_eq!(snapshot_calls, 0);
        assert!(transport.stream_requests().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_decode_failure_is_response_error() {
        let transport = MockTransport::new();
        transport.respond(Method::GET, SERVICES, "<html>");

        let mut on_snapshot = |_: Value| {};
        let mut on_event = |_: Value| WatchControl::Continue;

        let mut session = WatchSession::new(&transport, SERVICES, None);
        let err = session
            .run(&mut on_event, Some(&mut on_snapshot))
            .await
            .unwrap_err();

        assert!(matches!(err, KubernetesError::Response(_)));
    }

    #[tokio::test]
    async fn test_refused_stream_is_request_error() {
        let transport = MockTransport::new();
        transport.refuse_stream(
            format!("{}?watch=1", SERVICES),
            MockReply::Status(403, "forbidden".to_string()),
        );

        let mut on_event = |_: Value| WatchControl::Continue;
        let mut session = WatchSession::new(&transport, SERVICES, None);
        let err = session.run(&mut on_event, None).await.unwrap_err();

        assert_eq!(err.category(), "RequestError");
        assert_eq!(err.code(), Some(403));
    }

    #[tokio::test]
    async fn test_malformed_line_is_stream_decode_error() {
        let transport = MockTransport::new();
        transport.stream_lines(
            format!("{}?watch=1", SERVICES),
            &[r#"{"type":"ADDED","object":{}}"#, "<<garbage>>"],
        );

        let mut count = 0;
        let mut on_event = |_: Value| {
            count += 1;
            WatchControl::Continue
        };
        let mut session = WatchSession::new(&transport, SERVICES, None);
        let err = session.run(&mut on_event, None).await.unwrap_err();

        assert_eq!(count, 1);
        match err {
            KubernetesError::StreamDecode { raw, .. } => assert_eq!(raw, "<<garbage>>"),
            other => panic!("expected stream decode error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resume_token_tracks_last_event() {
        let transport = MockTransport::new();
        transport.stream_chunks(
            format!("{}?watch=1&resourceVersion=10", SERVICES),
            vec![
                MockChunk::data("{\"type\":\"ADDED\",\"object\":{\"metadata\":{\"resourceVersion\":\"11\"}}}\n"),
                MockChunk::data("{\"type\":\"MODIFIED\",\"object\":{\"metadata\":{\"resourceVersion\":\"12\"}}}\n"),
                MockChunk::Fail("connection reset by peer".to_string()),
            ],
        );

        let mut on_event = |_: Value| WatchControl::Continue;
        let mut session = WatchSession::new(&transport, SERVICES, Some("10".to_string()));
        let err = session.run(&mut on_event, None).await.unwrap_err();

        assert_eq!(err.category(), "RequestError");
        assert_eq!(session.resume_token(), Some("12".to_string()));
    }

    #[tokio::test]
    async fn test_error_event_clears_resume_token() {
        let transport = MockTransport::new();
        transport.stream_lines(
            format!("{}?watch=1&resourceVersion=10", SERVICES),
            &[r#"{"type":"ERROR","object":{"kind":"Status","code":410}}"#],
        );

        let mut on_event = |_: Value| WatchControl::Continue;
        let mut session = WatchSession::new(&transport, SERVICES, Some("10".to_string()));
        session.run(&mut on_event, None).await.unwrap();

        assert_eq!(session.resume_token(), None);
    }
}
