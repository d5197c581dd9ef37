//! Registry publish verifier - confirms a version becomes visible through a
//! package registry's read API.
//!
//! Publication is asynchronous relative to the push that triggers it, so the
//! verifier waits out a grace period and then polls, bounded independently
//! by an attempt budget and a wall-clock timeout. Exhausting either budget
//! is a warning, never a rollback trigger: by the time verification runs the
//! tag is already pushed and is not undone on account of registry latency.

use crate::error::{ReleaseError, Result};
use serde::Deserialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Read-only registry API: a package summary endpoint reporting the current
/// latest version, and a full version list endpoint.
///
/// Implementations treat non-200 responses and absent fields as "not yet
/// published" rather than hard errors; the polling loop owns the decision of
/// when to give up.
pub trait RegistryClient: Send + Sync {
    /// Latest version from the package summary, or `None` if not visible
    fn latest_version(&self, package: &str) -> Option<String>;

    /// All published versions, empty if the package is not visible
    fn versions(&self, package: &str) -> Vec<String>;
}

impl<T: RegistryClient + ?Sized> RegistryClient for Box<T> {
    fn latest_version(&self, package: &str) -> Option<String> {
        (**self).latest_version(package)
    }

    fn versions(&self, package: &str) -> Vec<String> {
        (**self).versions(package)
    }
}

/// Polling budget and pacing for publish verification
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Unconditional wait before the first check, absorbing known backend
    /// propagation delay
    pub grace_period: Duration,
    pub poll_interval: Duration,
    pub max_attempts: u32,
    /// Wall-clock ceiling, enforced independently of the attempt count
    pub timeout: Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        VerifierConfig {
            grace_period: Duration::from_secs(3),
            poll_interval: Duration::from_secs(2),
            max_attempts: 5,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Outcome of one verification run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Published { attempts: u32 },
    TimedOut { attempts: u32, elapsed: Duration },
}

impl VerifyOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, VerifyOutcome::Published { .. })
    }
}

/// Wait-then-check verification loop over a [RegistryClient]
pub struct PublishVerifier<C: RegistryClient> {
    config: VerifierConfig,
    client: C,
}

impl<C: RegistryClient> PublishVerifier<C> {
    pub fn new(config: VerifierConfig, client: C) -> Self {
        PublishVerifier { config, client }
    }

    /// Confirm `version` of `package` becomes visible.
    ///
    /// Sleeps the grace period, then checks the summary endpoint first (one
    /// cheap query answers the common case) and falls back to membership in
    /// the full version list. Retries until either `max_attempts` or the
    /// wall-clock `timeout` is exhausted, whichever comes first.
    pub fn verify(&self, package: &str, version: &str) -> VerifyOutcome {
        std::thread::sleep(self.config.grace_period);
        let start = Instant::now();

        let mut attempts = 0;
        while attempts < self.config.max_attempts {
            if start.elapsed() >= self.config.timeout {
                break;
            }
            attempts += 1;

            if self.client.latest_version(package).as_deref() == Some(version) {
                return VerifyOutcome::Published { attempts };
            }
            if self.client.versions(package).iter().any(|v| v == version) {
                return VerifyOutcome::Published { attempts };
            }

            if attempts < self.config.max_attempts
                && start.elapsed() + self.config.poll_interval < self.config.timeout
            {
                std::thread::sleep(self.config.poll_interval);
            }
        }

        VerifyOutcome::TimedOut {
            attempts,
            elapsed: start.elapsed(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CrateSummary {
    #[serde(rename = "crate")]
    krate: CrateInfo,
}

#[derive(Debug, Deserialize)]
struct CrateInfo {
    max_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VersionList {
    versions: Vec<VersionEntry>,
}

#[derive(Debug, Deserialize)]
struct VersionEntry {
    num: String,
}

/// HTTP client against a crates.io-shaped registry API
pub struct HttpRegistryClient {
    base: String,
    client: reqwest::blocking::Client,
}

impl HttpRegistryClient {
    /// Create a client for a registry API base URL
    /// (e.g., "https://crates.io")
    pub fn new(base: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("git-release/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                ReleaseError::config(format!("cannot build registry HTTP client: {}", e))
            })?;
        Ok(HttpRegistryClient {
            base: base.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Option<T> {
        let response = self.client.get(url).send().ok()?;
        if !response.status().is_success() {
            return None;
        }
        response.json().ok()
    }
}

impl RegistryClient for HttpRegistryClient {
    fn latest_version(&self, package: &str) -> Option<String> {
        let url = format!("{}/api/v1/crates/{}", self.base, package);
        self.get_json::<CrateSummary>(&url)?.krate.max_version
    }

    fn versions(&self, package: &str) -> Vec<String> {
        let url = format!("{}/api/v1/crates/{}/versions", self.base, package);
        self.get_json::<VersionList>(&url)
            .map(|list| list.versions.into_iter().map(|v| v.num).collect())
            .unwrap_or_default()
    }
}

/// Scripted registry for tests: versions become visible only after a
/// configured number of queries.
pub struct MockRegistryClient {
    latest: Option<String>,
    all: Vec<String>,
    visible_after: u32,
    queries: Mutex<u32>,
}

impl MockRegistryClient {
    /// A registry on which nothing ever appears
    pub fn never_publishes() -> Self {
        MockRegistryClient {
            latest: None,
            all: Vec::new(),
            visible_after: u32::MAX,
            queries: Mutex::new(0),
        }
    }

    /// A registry where `version` is immediately visible as latest
    pub fn published(version: impl Into<String>) -> Self {
        let version = version.into();
        MockRegistryClient {
            latest: Some(version.clone()),
            all: vec![version],
            visible_after: 0,
            queries: Mutex::new(0),
        }
    }

    /// A registry where `version` appears in the version list (not as
    /// latest) after `queries` lookups
    pub fn listed_after(version: impl Into<String>, queries: u32) -> Self {
        MockRegistryClient {
            latest: None,
            all: vec![version.into()],
            visible_after: queries,
            queries: Mutex::new(0),
        }
    }

    /// Total queries made against this mock
    pub fn query_count(&self) -> u32 {
        *self.queries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn tick(&self) -> u32 {
        let mut queries = self.queries.lock().unwrap_or_else(|e| e.into_inner());
        *queries += 1;
        *queries
    }
}

impl RegistryClient for MockRegistryClient {
    fn latest_version(&self, _package: &str) -> Option<String> {
        if self.tick() > self.visible_after {
            self.latest.clone()
        } else {
            None
        }
    }

    fn versions(&self, _package: &str) -> Vec<String> {
        if self.tick() > self.visible_after {
            self.all.clone()
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast(max_attempts: u32) -> VerifierConfig {
        VerifierConfig {
            grace_period: Duration::ZERO,
            poll_interval: Duration::ZERO,
            max_attempts,
            timeout: Duration::from_secs(30),
        }
    }

    #[test]
    fn test_immediate_publish_succeeds_first_attempt() {
        let verifier = PublishVerifier::new(fast(5), MockRegistryClient::published("1.3.0"));
        let outcome = verifier.verify("my-pkg", "1.3.0");
        assert_eq!(outcome, VerifyOutcome::Published { attempts: 1 });
    }

    #[test]
    fn test_version_list_membership_counts() {
        // Latest is never "1.3.0" but the list contains it after a few polls
        let verifier = PublishVerifier::new(fast(5), MockRegistryClient::listed_after("1.3.0", 4));
        let outcome = verifier.verify("my-pkg", "1.3.0");
        assert!(outcome.is_published());
    }

    #[test]
    fn test_attempt_budget_exhausted() {
        let verifier = PublishVerifier::new(fast(5), MockRegistryClient::never_publishes());
        match verifier.verify("my-pkg", "1.3.0") {
            VerifyOutcome::TimedOut { attempts, .. } => assert_eq!(attempts, 5),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_wall_clock_bound_enforced_independently() {
        let config = VerifierConfig {
            grace_period: Duration::ZERO,
            poll_interval: Duration::from_millis(50),
            max_attempts: 1000,
            timeout: Duration::from_millis(120),
        };
        let verifier = PublishVerifier::new(config, MockRegistryClient::never_publishes());
        let start = Instant::now();
        let outcome = verifier.verify("my-pkg", "1.3.0");
        assert!(!outcome.is_published());
        // A slow poll interval must not silently exceed the wall-clock budget
        assert!(start.elapsed() < Duration::from_secs(2));
        match outcome {
            VerifyOutcome::TimedOut { attempts, .. } => assert!(attempts < 1000),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_wrong_version_not_accepted() {
        let verifier = PublishVerifier::new(fast(2), MockRegistryClient::published("1.2.0"));
        assert!(!verifier.verify("my-pkg", "1.3.0").is_published());
    }

    #[test]
    fn test_http_client_construction() {
        let client = HttpRegistryClient::new("https://crates.io/").unwrap();
        assert_eq!(client.base, "https://crates.io");
    }

    #[test]
    fn test_mock_query_counting() {
        let client = MockRegistryClient::never_publishes();
        let _ = client.latest_version("x");
        let _ = client.versions("x");
        assert_eq!(client.query_count(), 2);
    }
}
