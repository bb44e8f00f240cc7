//! Process-wide store of trusted certificates.
//!
//! The store starts from the platform's default trust anchors and only ever
//! grows: certificates added during bootstrap remain trusted for the life of
//! the process. The anchor set lives behind an [`ArcSwap`] so that TLS
//! connections elsewhere in the process can read a consistent snapshot
//! without locking while an addition is in flight.

use arc_swap::ArcSwap;
use rustls::RootCertStore;
use rustls::client::verify_server_cert_signed_by_trust_anchor;
use rustls::crypto::CryptoProvider;
use rustls::server::ParsedCertificate;
use rustls_pki_types::{CertificateDer, UnixTime};
use std::sync::Arc;
use thiserror::Error;

/// Error type returned by [`TrustStore`] operations.
#[derive(Debug, Error)]
pub enum TrustStoreError {
    /// The certificate to be added could not be parsed into a trust anchor.
    #[error("cannot use certificate as a trust anchor: {0}")]
    BadAnchor(#[from] rustls::Error),
    /// An empty chain carries nothing to trust.
    #[error("certificate chain is empty")]
    EmptyChain,
}

/// One immutable generation of the anchor set. Readers hold on to a
/// generation for the duration of a handshake; additions publish a new one.
#[derive(Debug)]
pub(crate) struct Anchors {
    /// Raw DER of every anchor certificate, for exact-membership checks.
    pub(crate) certs: Vec<CertificateDer<'static>>,
    /// The same certificates as webpki trust anchors.
    pub(crate) roots: RootCertStore,
}

/// Process-wide, monotonically growing set of trusted certificates.
///
/// Intended to be created once at process start (usually via
/// [`TrustStore::from_platform_roots`]) and shared as an `Arc`. Tests can
/// substitute an isolated instance per case with [`TrustStore::empty`] or
/// [`TrustStore::with_roots`].
#[derive(Debug)]
pub struct TrustStore {
    inner: ArcSwap<Anchors>,
    provider: Arc<CryptoProvider>,
}

impl TrustStore {
    fn from_anchors(certs: Vec<CertificateDer<'static>>, roots: RootCertStore) -> Self {
        Self {
            inner: ArcSwap::from_pointee(Anchors { certs, roots }),
            provider: crate::crypto_provider(),
        }
    }

    /// A store initialized from the operating system's default trust
    /// anchors. Certificates the platform hands out but webpki cannot parse
    /// are skipped with a warning, as are per-certificate load errors; an
    /// unusable platform store yields an empty (but working) trust store.
    pub fn from_platform_roots() -> Self {
        let result = rustls_native_certs::load_native_certs();
        for e in result.errors {
            log::warn!("error loading platform trust anchors: {}", e);
        }
        Self::with_roots(result.certs)
    }

    /// A store with no anchors at all.
    pub fn empty() -> Self {
        Self::from_anchors(Vec::new(), RootCertStore::empty())
    }

    /// A store initialized from the given anchor certificates. Unparsable
    /// certificates are skipped with a warning.
    pub fn with_roots(certs: Vec<CertificateDer<'static>>) -> Self {
        let mut roots = RootCertStore::empty();
        let mut kept = Vec::with_capacity(certs.len());
        for cert in certs {
            match roots.add(cert.clone()) {
                Ok(()) => kept.push(cert),
                Err(e) => log::warn!("skipping unusable trust anchor: {}", e),
            }
        }
        Self::from_anchors(kept, roots)
    }

    /// Number of anchors currently in the store.
    pub fn len(&self) -> usize {
        self.inner.load().certs.len()
    }

    /// True if the store holds no anchors.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn snapshot(&self) -> Arc<Anchors> {
        self.inner.load_full()
    }

    pub(crate) fn provider(&self) -> &Arc<CryptoProvider> {
        &self.provider
    }

    /// Whether a presented chain (leaf first) is already covered by the
    /// current anchors: either some certificate in the chain is itself an
    /// anchor (byte-identical), or the leaf verifies against the anchor set
    /// under standard chain-validation rules.
    pub fn is_trusted(&self, chain: &[CertificateDer<'_>]) -> bool {
        let snapshot = self.inner.load();
        if chain
            .iter()
            .any(|cert| snapshot.certs.iter().any(|anchor| anchor == cert))
        {
            return true;
        }
        let Some(leaf) = chain.first() else {
            return false;
        };
        let Ok(parsed) = ParsedCertificate::try_from(leaf) else {
            return false;
        };
        verify_server_cert_signed_by_trust_anchor(
            &parsed,
            &snapshot.roots,
            &chain[1..],
            UnixTime::now(),
            self.provider.signature_verification_algorithms.all,
        )
        .is_ok()
    }

    /// Add a certificate as a new trust anchor. Adding a certificate that is
    /// already an anchor is a no-op. The addition is visible to concurrent
    /// readers as soon as it returns; anchors are never removed.
    pub fn add(&self, cert: CertificateDer<'static>) -> Result<(), TrustStoreError> {
        // Surface unparsable certificates before publishing anything.
        RootCertStore::empty().add(cert.clone())?;
        self.inner.rcu(|current| {
            if current.certs.iter().any(|anchor| anchor == &cert) {
                return Arc::clone(current);
            }
            let mut certs = current.certs.clone();
            let mut roots = current.roots.clone();
            certs.push(cert.clone());
            // Cannot fail: the same certificate parsed above.
            let _ = roots.add(cert.clone());
            Arc::new(Anchors { certs, roots })
        });
        Ok(())
    }
}
