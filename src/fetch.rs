//! Observation of the certificate chain a remote peer presents.
//!
//! The connection made here is not a trusting one: the TLS handshake is
//! configured to accept whatever chain the peer offers, because its sole
//! purpose is to see that chain. Trust decisions happen afterwards, in
//! [`crate::trust`].

use rustls::ClientConfig;
use rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use rustls::crypto::CryptoProvider;
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use crate::resolver::Target;

/// Per-target deadline covering TCP connect and TLS handshake.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Error type returned by [`fetch_chain`].
#[derive(Debug, Error)]
pub enum FetchError {
    /// TCP-level failure: refusal, unreachable host, DNS failure.
    #[error("connect failed: {0}")]
    Connect(std::io::Error),
    /// The deadline elapsed before the handshake produced a chain.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    /// The TLS handshake failed before the peer's chain could be observed.
    #[error("TLS handshake failed: {0}")]
    Handshake(std::io::Error),
    /// The target host is not expressible as a TLS server name.
    #[error("{0:?} is not a valid server name")]
    ServerName(String),
    /// Client configuration could not be built.
    #[error("{0}")]
    Config(#[from] rustls::Error),
    /// The handshake completed but the peer presented no certificates.
    #[error("peer presented no certificates")]
    NoCertificates,
}

/// A verifier that accepts any certificate chain.
///
/// Used only for the observing connection; nothing about the peer is checked
/// here, including signatures. The chain it waves through is what the caller
/// came for.
#[derive(Debug)]
struct ChainObserver(Arc<CryptoProvider>);

impl ServerCertVerifier for ChainObserver {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

fn observer_config() -> Result<ClientConfig, rustls::Error> {
    let provider = crate::crypto_provider();
    let verifier = Arc::new(ChainObserver(Arc::clone(&provider)));
    Ok(ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_no_client_auth())
}

/// Connect to `target` and return the certificate chain it presents,
/// leaf first, without validating it.
///
/// The whole operation is bounded by `timeout`. A peer that completes the
/// handshake without sending certificates yields
/// [`FetchError::NoCertificates`].
pub async fn fetch_chain(
    target: &Target,
    timeout: Duration,
) -> Result<Vec<CertificateDer<'static>>, FetchError> {
    let config = observer_config()?;
    let server_name = ServerName::try_from(target.host.clone())
        .map_err(|_| FetchError::ServerName(target.host.clone()))?;
    match tokio::time::timeout(timeout, observe(target, config, server_name)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(timeout)),
    }
}

async fn observe(
    target: &Target,
    config: ClientConfig,
    server_name: ServerName<'static>,
) -> Result<Vec<CertificateDer<'static>>, FetchError> {
    let stream = TcpStream::connect((target.host.as_str(), target.port))
        .await
        .map_err(FetchError::Connect)?;
    let connector = TlsConnector::from(Arc::new(config));
    let tls = connector
        .connect(server_name, stream)
        .await
        .map_err(FetchError::Handshake)?;
    let (_, connection) = tls.get_ref();
    connection
        .peer_certificates()
        .filter(|chain| !chain.is_empty())
        .map(|chain| chain.iter().map(|cert| cert.clone().into_owned()).collect())
        .ok_or(FetchError::NoCertificates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdata;

    fn target(host: &str, port: u16) -> Target {
        Target {
            host: host.to_string(),
            port,
        }
    }

    #[tokio::test]
    async fn observes_presented_leaf() {
        let (addr, server) = testdata::tls_server(&[testdata::SERVER_CERT], testdata::SERVER_KEY).await;
        let chain = fetch_chain(&target("127.0.0.1", addr.port()), DEFAULT_TIMEOUT)
            .await
            .expect("fetch");
        assert_eq!(chain, testdata::certs(testdata::SERVER_CERT));
        server.await.expect("server");
    }

    #[tokio::test]
    async fn observes_full_chain_leaf_first() {
        let (addr, server) =
            testdata::tls_server(&[testdata::SERVER_CERT, testdata::CACERT], testdata::SERVER_KEY).await;
        let chain = fetch_chain(&target("localhost", addr.port()), DEFAULT_TIMEOUT)
            .await
            .expect("fetch");
        let mut want = testdata::certs(testdata::SERVER_CERT);
        want.extend(testdata::certs(testdata::CACERT));
        assert_eq!(chain, want);
        server.await.expect("server");
    }

    #[tokio::test]
    async fn self_signed_peer_is_observed_not_rejected() {
        let (addr, server) = testdata::tls_server(&[testdata::SELF_SIGNED_CERT], testdata::SELF_SIGNED_KEY).await;
        let chain = fetch_chain(&target("127.0.0.1", addr.port()), DEFAULT_TIMEOUT)
            .await
            .expect("fetch");
        assert_eq!(chain, testdata::certs(testdata::SELF_SIGNED_CERT));
        server.await.expect("server");
    }

    #[tokio::test]
    async fn connection_refused() {
        let addr = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("bind");
            listener.local_addr().expect("local_addr")
        };
        // The listener is closed by now, so nothing is accepting on addr.
        let err = fetch_chain(&target("127.0.0.1", addr.port()), DEFAULT_TIMEOUT)
            .await
            .expect_err("should refuse");
        assert!(matches!(err, FetchError::Connect(_)), "{err:?}");
    }

    #[tokio::test]
    async fn unresponsive_peer_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local_addr");
        // Accept the TCP connection but never speak TLS.
        let hold = tokio::spawn(async move {
            let _conn = listener.accept().await;
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        let err = fetch_chain(
            &target("127.0.0.1", addr.port()),
            Duration::from_millis(200),
        )
        .await
        .expect_err("should time out");
        assert!(matches!(err, FetchError::Timeout(_)), "{err:?}");
        hold.abort();
    }

    #[tokio::test]
    async fn non_tls_peer_is_a_handshake_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local_addr");
        let server = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            let (mut conn, _) = listener.accept().await.expect("accept");
            let _ = conn.write_all(b"HTTP/1.0 400 Bad Request\r\n\r\n").await;
        });
        let err = fetch_chain(&target("127.0.0.1", addr.port()), DEFAULT_TIMEOUT)
            .await
            .expect_err("should fail handshake");
        assert!(matches!(err, FetchError::Handshake(_)), "{err:?}");
        server.await.expect("server");
    }

    #[tokio::test]
    async fn invalid_server_name() {
        let err = fetch_chain(&target("bad host", 443), DEFAULT_TIMEOUT)
            .await
            .expect_err("should reject name");
        assert!(matches!(err, FetchError::ServerName(_)), "{err:?}");
    }
}
