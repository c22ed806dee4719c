use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::info;
use rustls::{Certificate, PrivateKey, ServerConfig};

use crate::errors::Error;

pub const TLS_CERT_FILE: &str = "tls.crt";
pub const TLS_KEY_FILE: &str = "tls.key";

/// Load the serving certificate from `tls_dir`.
/// `Ok(None)` when the directory does not hold both files.
pub fn load_server_config(tls_dir: &Path) -> Result<Option<ServerConfig>, Error> {
    let cert_path = tls_dir.join(TLS_CERT_FILE);
    let key_path = tls_dir.join(TLS_KEY_FILE);
    if !cert_path.is_file() || !key_path.is_file() {
        return Ok(None);
    }
    info!("Loading TLS certificate from {}", tls_dir.display());

    let certs: Vec<Certificate> = rustls_pemfile::certs(&mut BufReader::new(File::open(&cert_path)?))?
        .into_iter()
        .map(Certificate)
        .collect();
    if certs.is_empty() {
        return Err(Error::Tls(format!("no certificate in {}", cert_path.display())));
    }

    let mut keys = rustls_pemfile::pkcs8_private_keys(&mut BufReader::new(File::open(&key_path)?))?;
    if keys.is_empty() {
        keys = rustls_pemfile::rsa_private_keys(&mut BufReader::new(File::open(&key_path)?))?;
    }
    let key = keys
        .into_iter()
        .next()
        .map(PrivateKey)
        .ok_or_else(|| Error::Tls(format!("no private key in {}", key_path.display())))?;

    let config = ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|err| Error::Tls(err.to_string()))?;
    Ok(Some(config))
}
