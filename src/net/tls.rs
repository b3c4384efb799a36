//! TLS configuration and certificate loading.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

/// Load TLS configuration from certificate and key files.
///
/// The PEM files are pre-validated so a bad deployment fails at startup
/// with a readable error instead of at the first handshake.
pub async fn load_tls_config(
    cert_path: &Path,
    key_path: &Path,
) -> Result<RustlsConfig, std::io::Error> {
    validate_cert_pem(cert_path)?;
    validate_key_pem(key_path)?;

    RustlsConfig::from_pem_file(cert_path, key_path).await
}

fn validate_cert_pem(cert_path: &Path) -> Result<(), std::io::Error> {
    let file = File::open(cert_path).map_err(|e| {
        std::io::Error::new(e.kind(), format!("Certificate file {:?}: {}", cert_path, e))
    })?;
    let certs: Vec<_> =
        rustls_pemfile::certs(&mut BufReader::new(file)).collect::<Result<_, _>>()?;
    if certs.is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("No certificates found in {:?}", cert_path),
        ));
    }
    Ok(())
}

fn validate_key_pem(key_path: &Path) -> Result<(), std::io::Error> {
    let file = File::open(key_path).map_err(|e| {
        std::io::Error::new(e.kind(), format!("Private key file {:?}: {}", key_path, e))
    })?;
    match rustls_pemfile::private_key(&mut BufReader::new(file))? {
        Some(_) => Ok(()),
        None => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("No private key found in {:?}", key_path),
        )),
    }
}
