//! Server certificate verification backed by the live trust store.
//!
//! Client configurations built here read a fresh [`TrustStore`] snapshot at
//! every handshake, so certificates trusted during bootstrap (or by any
//! later caller of [`TrustStore::add`]) take effect without rebuilding the
//! configuration.

use rustls::ClientConfig;
use rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use rustls::client::{verify_server_cert_signed_by_trust_anchor, verify_server_name};
use rustls::crypto::{WebPkiSupportedAlgorithms, verify_tls12_signature, verify_tls13_signature};
use rustls::server::ParsedCertificate;
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use std::sync::Arc;

use crate::store::TrustStore;

/// A [`ServerCertVerifier`] that consults the process trust store.
///
/// A presented end-entity certificate that is byte-identical to a stored
/// anchor is accepted as-is: that is the contract of trust-on-first-use,
/// where the anchor *is* the peer's own certificate and cannot be reached by
/// chain building. Every other peer gets standard webpki chain validation
/// against the current anchors plus server-name verification.
#[derive(Debug)]
pub struct TrustStoreVerifier {
    store: Arc<TrustStore>,
    supported_algs: WebPkiSupportedAlgorithms,
}

impl TrustStoreVerifier {
    /// A verifier reading from `store`.
    pub fn new(store: Arc<TrustStore>) -> Self {
        let supported_algs = store.provider().signature_verification_algorithms;
        Self {
            store,
            supported_algs,
        }
    }
}

impl ServerCertVerifier for TrustStoreVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let snapshot = self.store.snapshot();
        if snapshot.certs.iter().any(|anchor| anchor == end_entity) {
            return Ok(ServerCertVerified::assertion());
        }
        let parsed = ParsedCertificate::try_from(end_entity)?;
        verify_server_cert_signed_by_trust_anchor(
            &parsed,
            &snapshot.roots,
            intermediates,
            now,
            self.supported_algs.all,
        )?;
        verify_server_name(&parsed, server_name)?;
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.supported_algs)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.supported_algs)
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.store
            .provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// A TLS [`ClientConfig`] whose server verification follows the live trust
/// store. Build it once after bootstrap; later anchor additions are honored
/// automatically.
pub fn client_config(store: &Arc<TrustStore>) -> Result<ClientConfig, rustls::Error> {
    let verifier = Arc::new(TrustStoreVerifier::new(Arc::clone(store)));
    Ok(
        ClientConfig::builder_with_provider(Arc::clone(store.provider()))
            .with_safe_default_protocol_versions()?
            .dangerous()
            .with_custom_certificate_verifier(verifier)
            .with_no_client_auth(),
    )
}
