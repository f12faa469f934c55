//! TLS client configuration.
//!
//! Servers that ship their own certificate in the session metadata are authenticated by pinning
//! that exact certificate; anything else is verified against the webpki root store.

use std::{io, sync::Arc};

use tokio_rustls::rustls::{
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::{self, ring, CryptoProvider},
    pki_types::{CertificateDer, ServerName, UnixTime},
    ClientConfig, DigitallySignedStruct, Error as TlsError, RootCertStore, SignatureScheme,
};

/// Builds client configuration pinned to `certificate`, or using public roots when `None`.
pub(crate) fn client_config(certificate: Option<&[u8]>) -> io::Result<Arc<ClientConfig>> {
    let provider = Arc::new(ring::default_provider());

    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(io::Error::other)?;

    let config = match certificate {
        Some(der) => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(PinnedCertVerifier {
                certificate: CertificateDer::from(der.to_vec()),
                provider,
            }))
            .with_no_client_auth(),

        None => builder
            .with_root_certificates(webpki_roots_cert_store())
            .with_no_client_auth(),
    };

    Ok(Arc::new(config))
}

fn webpki_roots_cert_store() -> RootCertStore {
    let mut root_certs = RootCertStore::empty();
    root_certs.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    root_certs
}

/// Accepts exactly one end-entity certificate, regardless of name or issuer.
///
/// Handshake signatures are still verified so the peer must hold the certificate's private key.
#[derive(Debug)]
struct PinnedCertVerifier {
    certificate: CertificateDer<'static>,
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for PinnedCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        if end_entity[..] == self.certificate[..] {
            Ok(ServerCertVerified::assertion())
        } else {
            tracing::debug!("server certificate does not match pinned certificate");
            Err(TlsError::General("server certificate mismatch".to_owned()))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
