//! Startup-time trust bootstrapping for TLS certificates.
//!
//! On platforms where the set of backend hosts a process must trust is only
//! known at deploy time (Cloud Foundry style environments), there is no
//! static trust-store artifact to bake in. This crate establishes trust at
//! process startup instead: it reads target `host:port` pairs from the
//! `CF_TARGET` and `TRUST_CERTS` environment variables, connects to each one
//! to observe the certificate chain the peer presents, and adds the leaf
//! certificate to a process-wide [`TrustStore`] if the chain is not already
//! covered by it.
//!
//! The observing connection deliberately accepts any certificate; the point
//! is to see what the peer offers, not to validate it. Once observed, the
//! leaf is trusted unconditionally (trust-on-first-use) and remains trusted
//! for the lifetime of the process. Subsequent TLS client connections built
//! via [`client_config`] consult the live store, so certificates added
//! during bootstrap are honored without rebuilding configuration.
//!
//! Usage:
//!
//! ```no_run
//! use cf_cert_truster::{CertTruster, TrustStore};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let store = Arc::new(TrustStore::from_platform_roots());
//! let truster = CertTruster::new(Arc::clone(&store));
//! if let Err(e) = truster.run_from_env().await {
//!     log::error!("{e}");
//!     std::process::exit(1);
//! }
//! let config = cf_cert_truster::client_config(&store).unwrap();
//! // ...hand `config` to HTTP clients etc...
//! # }
//! ```
//!
//! Failure to establish trust for any configured target is terminal: the
//! orchestrator returns an error naming the target and the caller is
//! expected to abort startup, since later TLS connections would fail in a
//! less diagnosable way.

#![warn(missing_docs)]

use rustls::crypto::CryptoProvider;
use std::sync::Arc;

pub mod bootstrap;
pub mod fetch;
pub mod resolver;
pub mod store;
pub mod trust;
pub mod verifier;

#[cfg(test)]
pub(crate) mod testdata;

pub use bootstrap::{BootstrapError, CertTruster, TargetOutcome};
pub use fetch::FetchError;
pub use resolver::Target;
pub use store::{TrustStore, TrustStoreError};
pub use trust::TrustOutcome;
pub use verifier::client_config;

/// The process-global default [`CryptoProvider`] if there is one, otherwise
/// the `aws_lc_rs` one.
pub(crate) fn crypto_provider() -> Arc<CryptoProvider> {
    CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}
