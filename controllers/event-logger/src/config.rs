//! Event logger configuration, read from environment variables.

use anyhow::{Context, Result, bail};
use kubernetes_client::{KubernetesClientFactory, ResumePolicy, WatchOptions};
use std::env;

/// Runtime configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// `KUBERNETES_API_URL`; in-cluster service account when unset
    pub api_url: Option<String>,
    /// `KUBERNETES_TOKEN`: literal, `file://` or `data:` URI
    pub token: Option<String>,
    /// `KUBERNETES_CA_FILE`
    pub ca_file: Option<String>,
    /// `KUBERNETES_INSECURE`: skip server certificate verification
    pub insecure: bool,
    /// `WATCH_ENDPOINT`, e.g. `/api/v1/namespaces/default/services`
    pub endpoint: String,
    /// `WATCH_SNAPSHOT`: seed the watch with a snapshot of the collection
    pub snapshot: bool,
    /// `WATCH_RESUME`: `restart` (default) or `last-seen`
    pub resume_policy: ResumePolicy,
    /// `WATCH_RESOURCE_VERSION`: start streaming here instead of the current state
    pub resource_version: Option<String>,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let endpoint = lookup("WATCH_ENDPOINT")
            .context("WATCH_ENDPOINT environment variable is required")?;

        let resume_policy = match lookup("WATCH_RESUME").as_deref() {
            None | Some("restart") => ResumePolicy::Restart,
            Some("last-seen") => ResumePolicy::LastSeen,
            Some(other) => bail!("WATCH_RESUME must be `restart` or `last-seen`, got `{}`", other),
        };

        Ok(Self {
            api_url: lookup("KUBERNETES_API_URL"),
            token: lookup("KUBERNETES_TOKEN"),
            ca_file: lookup("KUBERNETES_CA_FILE"),
            insecure: flag(lookup("KUBERNETES_INSECURE")),
            endpoint,
            snapshot: flag(lookup("WATCH_SNAPSHOT")),
            resume_policy,
            resource_version: lookup("WATCH_RESOURCE_VERSION"),
        })
    }

    /// Client factory for this configuration
    pub fn client_factory(&self) -> Result<KubernetesClientFactory> {
        let mut factory = match &self.api_url {
            Some(url) => KubernetesClientFactory::connect_to(url.as_str()),
            None => KubernetesClientFactory::in_cluster()
                .context("KUBERNETES_API_URL is not set and in-cluster configuration failed")?,
        };

        if let Some(token) = &self.token {
            factory = factory.with_access_token(token)?;
        }
        if let Some(ca_file) = &self.ca_file {
            factory = factory.with_certificate_authority(ca_file.as_str());
        }
        if self.insecure {
            factory = factory.without_certificate_authority_verification();
        }

        let mut watch = WatchOptions::default().with_resume_policy(self.resume_policy);
        if let Some(resource_version) = &self.resource_version {
            watch = watch.with_resource_version(resource_version.as_str());
        }

        Ok(factory.with_watch_options(watch))
    }
}

fn flag(value: Option<String>) -> bool {
    matches!(
        value.as_deref().map(str::to_ascii_lowercase).as_deref(),
        Some("1" | "true" | "yes")
    )
}
