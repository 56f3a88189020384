//! Kubernetes REST API Client
//!
//! A small client for the Kubernetes API server: JSON request wrappers for
//! the CRUD verbs, and a watch engine that keeps a change-notification stream
//! alive across failures until the caller asks it to stop.
//!
//! # Example
//!
//! ```no_run
//! use kubernetes_client::{KubernetesClientFactory, WatchEvent};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = KubernetesClientFactory::connect_to("https://kubernetes.default.svc")
//!     .with_certificate_authority("/var/run/secrets/kubernetes.io/serviceaccount/ca.crt")
//!     .with_access_token("file:///var/run/secrets/kubernetes.io/serviceaccount/token")?
//!     .construct_client()?;
//!
//! // Plain requests
//! let services = client
//!     .get("/api/v1/namespaces/default/services", &[("labelSelector", "app=web")])
//!     .await?;
//!
//! // Watch until ten events have been seen
//! let mut seen = 0;
//! client
//!     .watch_with_snapshot(
//!         "/api/v1/namespaces/default/services",
//!         |event| {
//!             if let Ok(event) = WatchEvent::from_value(event) {
//!                 println!("{:?} {:?}", event.event_type, event.name());
//!             }
//!             seen += 1;
//!             seen < 10
//!         },
//!         |snapshot| println!("{} services", snapshot["items"].as_array().map_or(0, Vec::len)),
//!     )
//!     .await;
//! # let _ = services;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Request wrappers**: GET/POST/PUT/PATCH/DELETE with JSON bodies
//! - **Watch**: optional snapshot, NDJSON stream decoding, caller-driven stop
//! - **Self-healing**: failed watch attempts restart after a fixed delay, forever
//! - **Mocking**: `MockTransport` behind the `test-util` feature

#![warn(missing_docs)]

pub mod client;
pub mod error;
pub mod factory;
pub mod query;
pub mod transport;
pub mod watch;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::KubernetesClient;
pub use error::{KubernetesError, TransportError};
pub use factory::{ClientConfig, KeyMaterial, KubernetesClientFactory, TlsVerification};
pub use transport::{ByteStream, HttpTransport, ReqwestTransport};
pub use watch::{
    NdjsonFramer, ResumePolicy, WatchControl, WatchEvent, WatchEventType, WatchOptions,
};
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockChunk, MockReply, MockTransport, RecordedRequest};
