//! The startup routine tying resolution, fetching, and trust together.
//!
//! [`CertTruster::run_from_env`] is meant to be called exactly once, early
//! in process startup, before the application opens any TLS connection that
//! depends on the newly trusted hosts. Targets are processed strictly in
//! configuration order; the first failure ends the run with an error naming
//! the target, and the caller is expected to abort startup on it.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::fetch::{self, FetchError};
use crate::resolver::{self, Target};
use crate::store::{TrustStore, TrustStoreError};
use crate::trust::{self, TrustOutcome};

/// Environment variable holding the platform API URL; only an `https` URL
/// is actionable.
pub const CF_TARGET: &str = "CF_TARGET";

/// Environment variable holding a comma-separated list of `host[:port]`
/// entries to trust, default port 443.
pub const TRUST_CERTS: &str = "TRUST_CERTS";

/// Error type returned when trust could not be established for a target.
///
/// Any one of these is grounds to abort startup: the process's later TLS
/// connections are assumed to depend on the missing trust, and continuing
/// would just defer the failure to a less diagnosable point.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The target's certificate chain could not be observed.
    #[error("trusting certificate at {target} failed: {source}")]
    Fetch {
        /// The target that failed.
        target: Target,
        /// Why the fetch failed.
        #[source]
        source: FetchError,
    },
    /// The observed chain could not be recorded in the trust store.
    #[error("trusting certificate at {target} failed: {source}")]
    Store {
        /// The target that failed.
        target: Target,
        /// Why the store rejected the addition.
        #[source]
        source: TrustStoreError,
    },
}

impl BootstrapError {
    /// The target for which trust establishment failed.
    pub fn target(&self) -> &Target {
        match self {
            BootstrapError::Fetch { target, .. } => target,
            BootstrapError::Store { target, .. } => target,
        }
    }
}

/// What happened for one target during a successful run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetOutcome {
    /// The target that was processed.
    pub target: Target,
    /// Whether its certificate was already trusted or newly added.
    pub outcome: TrustOutcome,
}

/// One-shot trust establishment over a shared [`TrustStore`].
pub struct CertTruster {
    store: Arc<TrustStore>,
    timeout: Duration,
}

impl CertTruster {
    /// A truster mutating `store`, with the default 5000 ms per-target
    /// timeout.
    pub fn new(store: Arc<TrustStore>) -> Self {
        Self {
            store,
            timeout: fetch::DEFAULT_TIMEOUT,
        }
    }

    /// Replace the per-target timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read `CF_TARGET` and `TRUST_CERTS` from the process environment and
    /// run. With neither variable set this makes no network connections and
    /// returns an empty outcome list.
    pub async fn run_from_env(&self) -> Result<Vec<TargetOutcome>, BootstrapError> {
        let cf_target = std::env::var(CF_TARGET).ok();
        let trust_certs = std::env::var(TRUST_CERTS).ok();
        self.run(cf_target.as_deref(), trust_certs.as_deref()).await
    }

    /// Establish trust for every target the two configuration values
    /// resolve to, in order. Stops at the first failure.
    pub async fn run(
        &self,
        cf_target: Option<&str>,
        trust_certs: Option<&str>,
    ) -> Result<Vec<TargetOutcome>, BootstrapError> {
        let targets = resolver::resolve(cf_target, trust_certs);
        let mut outcomes = Vec::with_capacity(targets.len());
        for target in targets {
            let outcome = self.establish(&target).await.inspect_err(|e| {
                log::error!("{}", e);
            })?;
            outcomes.push(TargetOutcome { target, outcome });
        }
        Ok(outcomes)
    }

    async fn establish(&self, target: &Target) -> Result<TrustOutcome, BootstrapError> {
        let chain = fetch::fetch_chain(target, self.timeout)
            .await
            .map_err(|source| BootstrapError::Fetch {
                target: target.clone(),
                source,
            })?;
        let outcome =
            trust::ensure_trusted(&chain, &self.store).map_err(|source| BootstrapError::Store {
                target: target.clone(),
                source,
            })?;
        match outcome {
            TrustOutcome::Added => log::info!(
                "trusting certificate at {} succeeded: added {}",
                target,
                trust::describe_leaf(&chain)
            ),
            TrustOutcome::AlreadyTrusted => {
                log::info!("certificate at {} is already trusted", target)
            }
        }
        Ok(outcome)
    }
}
