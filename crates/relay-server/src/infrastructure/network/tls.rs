//! TLS acceptor construction for the secure listeners.
//!
//! Reads a PEM certificate chain and a PEM private key from disk and builds a
//! [`TlsAcceptor`].  The secure listeners then run the TLS handshake on each
//! accepted socket and hand the decrypted stream to the same handlers the
//! plaintext listeners use.
//!
//! # What is PEM? (for beginners)
//!
//! PEM is the text format most tools (openssl, certbot, ...) write keys and
//! certificates in: base64 between `-----BEGIN ...-----` and
//! `-----END ...-----` markers.  One file can hold several certificates (the
//! full chain, leaf first).  A quick self-signed pair for testing:
//!
//! ```text
//! openssl req -x509 -newkey rsa:2048 -nodes -days 365 \
//!     -keyout relay.key -out relay.crt -subj "/CN=relay"
//! ```
//!
//! Client certificates are not requested; any peer that completes the
//! handshake is accepted.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use thiserror::Error;
use tokio_rustls::TlsAcceptor;

/// Failure to load TLS material.  Always fatal at startup.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read TLS file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no certificates found in {0}")]
    NoCertificates(PathBuf),

    #[error("no private key found in {0}")]
    NoPrivateKey(PathBuf),

    #[error("TLS configuration rejected: {0}")]
    Rustls(#[from] rustls::Error),
}

/// Builds an acceptor from a certificate chain file and a private key file.
///
/// # Errors
///
/// See [`TlsError`].
pub fn load_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, TlsError> {
    let certs = load_certs(cert_path)?;
    let key = load_key(key_path)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// Reads every certificate in a PEM file, leaf first.
pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

/// Reads the first private key (PKCS#8, PKCS#1 or SEC1) in a PEM file.
pub fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(path.to_path_buf()))
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Writes `contents` to a per-test file under the system temp dir.
    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "relay-server-tls-{}-{name}",
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_missing_cert_file_is_io_error() {
        let path = Path::new("/definitely/not/here/relay.crt");
        let err = load_certs(path).unwrap_err();
        assert!(matches!(err, TlsError::Io { .. }));
        assert!(err.to_string().contains("relay.crt"));
    }

    #[test]
    fn test_file_without_certificates_is_rejected() {
        // Arrange
        let path = temp_file("empty.crt", "not a certificate\n");

        // Act
        let err = load_certs(&path).unwrap_err();

        // Assert
        assert!(matches!(err, TlsError::NoCertificates(_)));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_file_without_key_is_rejected() {
        let path = temp_file("empty.key", "# nothing to see\n");
        let err = load_key(&path).unwrap_err();
        assert!(matches!(err, TlsError::NoPrivateKey(_)));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_load_acceptor_fails_before_reading_key_when_cert_missing() {
        let err = load_acceptor(
            Path::new("/definitely/not/here/relay.crt"),
            Path::new("/definitely/not/here/relay.key"),
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("relay.crt"));
    }
}
