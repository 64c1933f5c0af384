//! Remote release check.
//!
//! The check fetches a JSON release descriptor, takes its `tag_name`, pulls
//! the first numeric-dotted run out of it and compares that number against the
//! installed version as floating point.
//!
//! Both sides are truncated to their first float-parseable token: `"v1.2"` and
//! `"1.2.0-beta"` both compare as `1.2`, and `"1.10"` compares as `1.1` (so it
//! sorts below `"1.9"`). This tolerance is intentional and kept as-is; a tag
//! with no numeric run fails the check instead of being guessed at.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde_json::Value;

static VERSION_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+\.*\d+)").expect("version token pattern is a valid regex")
});

/// Why a release check failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpdateCheckError {
    /// The HTTP client could not be built.
    #[error("failed to build http client: {0}")]
    Client(String),
    /// The request could not be sent or its body could not be read.
    #[error("release request failed: {0}")]
    Request(String),
    /// The endpoint answered with a non-success status.
    #[error("release endpoint returned {0}")]
    Status(u16),
    /// The body is not JSON.
    #[error("invalid release descriptor: {0}")]
    InvalidJson(String),
    /// The descriptor has no string `tag_name`.
    #[error("release descriptor has no tag_name")]
    MissingTag,
    /// The tag holds no numeric version run.
    #[error("no version number in release tag {0:?}")]
    NoVersionToken(String),
    /// The installed version holds no numeric version run.
    #[error("no version number in installed version {0:?}")]
    InvalidLocalVersion(String),
}

/// Result of a release check. Failures are values, never panics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The installed version is at least as new as the published one.
    UpToDate,
    /// A newer release is published under this tag.
    NewVersionAvailable(String),
    /// The check could not complete.
    CheckFailed(UpdateCheckError),
}

/// Returns the first numeric-dotted run in `text` (`"v2.3.1"` gives `"2.3"`).
///
/// The run needs at least two digits, so a bare `"v7"` yields nothing.
pub fn extract_version_token(text: &str) -> Option<&str> {
    VERSION_TOKEN.find(text).map(|found| found.as_str())
}

fn version_number(text: &str) -> Option<f64> {
    extract_version_token(text)?.parse::<f64>().ok()
}

/// Compares a published release tag against the installed version.
pub fn evaluate_release(tag: &str, local_version: &str) -> UpdateOutcome {
    let Some(remote) = version_number(tag) else {
        return UpdateOutcome::CheckFailed(UpdateCheckError::NoVersionToken(tag.to_string()));
    };
    let Some(local) = version_number(local_version) else {
        return UpdateOutcome::CheckFailed(UpdateCheckError::InvalidLocalVersion(
            local_version.to_string(),
        ));
    };

    if local < remote {
        UpdateOutcome::NewVersionAvailable(tag.to_string())
    } else {
        UpdateOutcome::UpToDate
    }
}

/// Pulls `tag_name` out of a release descriptor body.
pub fn parse_release_tag(body: &str) -> Result<String, UpdateCheckError> {
    let root: Value =
        serde_json::from_str(body).map_err(|err| UpdateCheckError::InvalidJson(err.to_string()))?;
    root.get("tag_name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(UpdateCheckError::MissingTag)
}

/// Checks a release endpoint against the installed version. One request per
/// check, no retry and no caching.
#[derive(Debug, Clone)]
pub struct UpdateChecker {
    client: reqwest::Client,
    endpoint: String,
    local_version: String,
}

impl UpdateChecker {
    /// Builds a checker with its own HTTP client.
    pub fn new(
        endpoint: impl Into<String>,
        local_version: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, UpdateCheckError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("castbar/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|err| UpdateCheckError::Client(err.to_string()))?;
        Ok(Self::with_client(client, endpoint, local_version))
    }

    /// Builds a checker around an existing client.
    pub fn with_client(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        local_version: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            local_version: local_version.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn local_version(&self) -> &str {
        &self.local_version
    }

    /// Fetches the latest release and compares it with the installed version.
    pub async fn check(&self) -> UpdateOutcome {
        let outcome = match self.fetch_tag().await {
            Ok(tag) => evaluate_release(&tag, &self.local_version),
            Err(err) => UpdateOutcome::CheckFailed(err),
        };

        match &outcome {
            UpdateOutcome::CheckFailed(err) => log::error!("get update info error: {err}"),
            UpdateOutcome::NewVersionAvailable(tag) => log::info!("New release available: {tag}"),
            UpdateOutcome::UpToDate => log::debug!("Version {} is up to date", self.local_version),
        }
        outcome
    }

    async fn fetch_tag(&self) -> Result<String, UpdateCheckError> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|err| UpdateCheckError::Request(err.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpdateCheckError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|err| UpdateCheckError::Request(err.without_url().to_string()))?;
        let tag = parse_release_tag(&body)?;
        log::debug!("tag_name: {tag}");
        Ok(tag)
    }
}
