use std::fs;
use std::io::BufReader;
use std::sync::Arc;

use rustls::ServerConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use thiserror::Error;

/// The API server reaches the webhook as `<service>.<namespace>.svc`; the
/// certificate's SANs must cover that name. The mounted pair is used as is
/// and never generated or rotated here.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read certificate '{path}': {source}")]
    CertRead {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to read private key '{path}': {source}")]
    KeyRead {
        path: String,
        source: std::io::Error,
    },
    #[error("no PEM certificates found in '{0}'")]
    NoCerts(String),
    #[error("no PEM private key found in '{0}'")]
    NoKey(String),
    #[error("failed to build TLS config: {0}")]
    Rustls(#[from] rustls::Error),
}

pub fn load_server_config(cert_path: &str, key_path: &str) -> Result<Arc<ServerConfig>, TlsError> {
    let certs = read_certs(cert_path)?;
    let key = read_key(key_path)?;

    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

fn read_certs(path: &str) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let data = fs::read(path).map_err(|source| TlsError::CertRead {
        path: path.to_string(),
        source,
    })?;

    let certs = rustls_pemfile::certs(&mut BufReader::new(data.as_slice()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::CertRead {
            path: path.to_string(),
            source,
        })?;

    if certs.is_empty() {
        return Err(TlsError::NoCerts(path.to_string()));
    }
    Ok(certs)
}

fn read_key(path: &str) -> Result<PrivateKeyDer<'static>, TlsError> {
    let data = fs::read(path).map_err(|source| TlsError::KeyRead {
        path: path.to_string(),
        source,
    })?;

    rustls_pemfile::private_key(&mut BufReader::new(data.as_slice()))
        .map_err(|source| TlsError::KeyRead {
            path: path.to_string(),
            source,
        })?
        .ok_or_else(|| TlsError::NoKey(path.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_cert_file() {
        let err = load_server_config("/nonexistent/tls.crt", "/nonexistent/tls.key").unwrap_err();
        assert!(matches!(
            err,
            TlsError::CertRead { ref path, .. } if path == "/nonexistent/tls.crt"
        ));
    }

    #[test]
    fn test_file_without_pem_blocks() {
        let path = std::env::temp_dir()
            .join(format!("image-validator-{}-empty.crt", std::process::id()));
        fs::write(&path, "not a certificate\n").unwrap();
        let path_str = path.to_str().unwrap();

        let err = read_certs(path_str).unwrap_err();
        assert!(matches!(err, TlsError::NoCerts(_)));
        let err = read_key(path_str).unwrap_err();
        assert!(matches!(err, TlsError::NoKey(_)));

        fs::remove_file(&path).ok();
    }
}
