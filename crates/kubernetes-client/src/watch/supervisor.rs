//! Retry-forever loop around watch sessions.
//!
//! ```text
//! Starting --(session built)--> Streaming --(callback stop)--> Stopped
//!    ^                            |    |
//!    |<------(server closed)------+    +--(failure)--> Retrying
//!    |<---------------(fixed delay elapsed)---------------+
//! ```
//!
//! There is no retry limit and no backoff growth. Failures are logged and
//! never surface to the caller. A server close after at least one event
//! reconnects at once; an empty stream counts as a failure and waits the
//! retry delay.

use crate::transport::HttpTransport;
use crate::watch::session::{SessionOutcome, WatchSession};
use crate::watch::{EventCallback, ResumePolicy, SnapshotCallback, WatchOptions};
use tracing::{debug, info, warn};

enum WatchState<'a> {
    Starting,
    Streaming(WatchSession<'a>),
    Retrying,
    Stopped,
}

pub(crate) struct WatchSupervisor<'a> {
    transport: &'a dyn HttpTransport,
    endpoint: &'a str,
    options: &'a WatchOptions,
}

impl<'a> WatchSupervisor<'a> {
    pub(crate) fn new(
        transport: &'a dyn HttpTransport,
        endpoint: &'a str,
        options: &'a WatchOptions,
    ) -> Self {
        Self {
            transport,
            endpoint,
            options,
        }
    }

    /// Run until the event callback asks to stop
    pub(crate) async fn run(
        &self,
        on_event: &mut EventCallback<'_>,
        mut on_snapshot: Option<&mut SnapshotCallback<'_>>,
    ) {
        let mut resume_token: Option<String> = None;
        let mut state = WatchState::Starting;
        let mut attempts: u64 = 0;

        loop {
            state = match state {
                WatchState::Starting => {
                    let start_at = match self.options.resume_policy {
                        ResumePolicy::Restart => self.options.resource_version.clone(),
                        ResumePolicy::LastSeen if attempts == 0 => {
                            self.options.resource_version.clone()
                        }
                        ResumePolicy::LastSeen => resume_token.take(),
                    };
                    attempts += 1;
                    debug!(endpoint = %self.endpoint, resource_version = ?start_at, "Opening watch session");
                    WatchState::Streaming(WatchSession::new(self.transport, self.endpoint, start_at))
                }
                WatchState::Streaming(mut session) => {
                    let result = session.run(on_event, on_snapshot.as_deref_mut()).await;
                    resume_token = session.resume_token();

                    match result {
                        Ok(SessionOutcome::Stopped) => WatchState::Stopped,
                        Ok(SessionOutcome::StreamEnded) if session.delivered() == 0 => {
                            warn!(endpoint = %self.endpoint, "Watch stream closed without delivering any events");
                            WatchState::Retrying
                        }
                        Ok(SessionOutcome::StreamEnded) => {
                            info!(endpoint = %self.endpoint, "Watch stream closed by server, reconnecting");
                            WatchState::Starting
                        }
                        Err(e) => {
                            warn!(
                                error.class = e.category(),
                                error.message = %e,
                                error.code = e.code().unwrap_or(0),
                                "Caught exception: {} ({})",
                                e,
                                e.code().unwrap_or(0)
                            );
                            WatchState::Retrying
                        }
                    }
                }
                WatchState::Retrying => {
                    info!("Retrying in {:?}", self.options.retry_delay);
                    tokio::time::sleep(self.options.retry_delay).await;
                    WatchState::Starting
                }
                WatchState::Stopped => return,
            };
        }
    }
}
