//! The decision of whether an observed chain needs to be trusted.
//!
//! This is a trust-on-first-use bootstrap, preserved deliberately from the
//! reference behavior: if the observed chain is not already covered by the
//! store, its leaf certificate is added as a trust anchor with no hostname,
//! expiry, or CA-policy check gating the addition. Callers that want
//! stricter admission must not reach this point with chains they would
//! refuse.

use rustls_pki_types::CertificateDer;
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;

use crate::store::{TrustStore, TrustStoreError};

/// Per-target result of [`ensure_trusted`]. Failures travel through the
/// error channel instead of a third variant so the caller decides whether
/// they abort startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrustOutcome {
    /// The chain already verified against the store; nothing was changed.
    AlreadyTrusted,
    /// The chain's leaf certificate was added as a new trust anchor.
    Added,
}

/// Make sure `chain` (leaf first, as presented by the peer) is covered by
/// `store`, adding the leaf as an anchor if it is not.
pub fn ensure_trusted(
    chain: &[CertificateDer<'static>],
    store: &TrustStore,
) -> Result<TrustOutcome, TrustStoreError> {
    if store.is_trusted(chain) {
        return Ok(TrustOutcome::AlreadyTrusted);
    }
    let leaf = chain.first().ok_or(TrustStoreError::EmptyChain)?;
    store.add(leaf.clone())?;
    Ok(TrustOutcome::Added)
}

/// Human-readable identity of a chain's leaf for log messages, best effort.
pub(crate) fn describe_leaf(chain: &[CertificateDer<'_>]) -> String {
    chain
        .first()
        .and_then(|leaf| X509Certificate::from_der(leaf.as_ref()).ok())
        .map(|(_, cert)| {
            format!(
                "{} (expires {})",
                cert.subject(),
                cert.validity().not_after
            )
        })
        .unwrap_or_else(|| "<unparsable certificate>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdata;

    #[test]
    fn covered_chain_is_left_alone() {
        let store = TrustStore::with_roots(testdata::certs(testdata::CACERT));
        let chain = testdata::certs(testdata::SERVER_CERT);
        assert_eq!(
            ensure_trusted(&chain, &store).expect("ensure"),
            TrustOutcome::AlreadyTrusted
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unknown_leaf_is_added_then_stable() {
        let store = TrustStore::empty();
        let chain = testdata::certs(testdata::SELF_SIGNED_CERT);
        assert_eq!(
            ensure_trusted(&chain, &store).expect("first"),
            TrustOutcome::Added
        );
        assert_eq!(store.len(), 1);
        assert_eq!(
            ensure_trusted(&chain, &store).expect("second"),
            TrustOutcome::AlreadyTrusted
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn ca_signed_leaf_without_anchored_issuer_is_added() {
        // Only the leaf is added, not its issuer: trust is for what was
        // observed, nothing broader.
        let store = TrustStore::empty();
        let chain = testdata::certs(testdata::SERVER_CERT);
        assert_eq!(
            ensure_trusted(&chain, &store).expect("ensure"),
            TrustOutcome::Added
        );
        assert_eq!(store.len(), 1);
        assert!(!store.is_trusted(&testdata::certs(testdata::CACERT)));
    }

    #[test]
    fn empty_chain_is_an_error() {
        let store = TrustStore::empty();
        assert!(matches!(
            ensure_trusted(&[], &store),
            Err(TrustStoreError::EmptyChain)
        ));
    }

    #[test]
    fn leaf_description_names_the_subject() {
        let described = describe_leaf(&testdata::certs(testdata::SERVER_CERT));
        assert!(described.contains("localhost"), "{described}");
    }
}
