//! Watch engine
//!
//! A watch registration is driven by three layers:
//! - [`framer`]: decodes the newline-delimited JSON response body
//! - `session`: one attempt, i.e. optional snapshot plus one streaming GET
//! - `supervisor`: restarts sessions forever until the event callback says stop

pub mod event;
pub mod framer;
pub(crate) mod session;
pub(crate) mod supervisor;

use serde_json::Value;
use std::time::Duration;

pub use event::{WatchEvent, WatchEventType};
pub use framer::{FrameError, NdjsonFramer};

/// Fixed delay between a failed watch attempt and the next one
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Event callback verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchControl {
    /// Keep streaming
    Continue,
    /// Close the stream and return from the watch call
    Stop,
}

impl From<bool> for WatchControl {
    /// `false` stops the watch, `true` continues
    fn from(keep_going: bool) -> Self {
        if keep_going {
            WatchControl::Continue
        } else {
            WatchControl::Stop
        }
    }
}

impl From<()> for WatchControl {
    fn from((): ()) -> Self {
        WatchControl::Continue
    }
}

/// Where a restarted watch attempt resumes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResumePolicy {
    /// Start over: stream from the caller supplied `resourceVersion` if there
    /// is one, else re-run the snapshot if one was requested, else stream from
    /// the current server state. Already-seen events may be replayed.
    #[default]
    Restart,
    /// Resume from the `resourceVersion` of the last delivered event and skip
    /// the snapshot. An `ERROR` event (e.g. 410 Gone) falls back to `Restart`
    /// for the next attempt.
    LastSeen,
}

/// Supervisor tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOptions {
    /// Delay before restarting after a failed attempt
    pub retry_delay: Duration,
    /// Resumption behaviour across restarts
    pub resume_policy: ResumePolicy,
    /// Caller supplied `resourceVersion` to start streaming from
    ///
    /// When set, the snapshot is skipped. Under [`ResumePolicy::Restart`] every
    /// attempt starts from it again; under [`ResumePolicy::LastSeen`] only the
    /// first attempt does.
    pub resource_version: Option<String>,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
            resume_policy: ResumePolicy::default(),
            resource_version: None,
        }
    }
}

impl WatchOptions {
    /// Override the retry delay
    #[must_use]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Override the resume policy
    #[must_use]
    pub fn with_resume_policy(mut self, resume_policy: ResumePolicy) -> Self {
        self.resume_policy = resume_policy;
        self
    }

    /// Start streaming at `resource_version` instead of the current state
    #[must_use]
    pub fn with_resource_version(mut self, resource_version: impl Into<String>) -> Self {
        self.resource_version = Some(resource_version.into());
        self
    }
}

pub(crate) type EventCallback<'a> = dyn FnMut(Value) -> WatchControl + Send + 'a;
pub(crate) type SnapshotCallback<'a> = dyn FnMut(Value) + Send + 'a;
