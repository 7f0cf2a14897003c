//! Database addresses and connection setup.
//!
//! Addresses use the OVN notation: `tcp:HOST:PORT`, `ssl:HOST:PORT` or
//! `unix:/path/to/socket`. IPv6 hosts are written in brackets
//! (`ssl:[fd00::1]:6641`).

use crate::error::{OvsdbError, Result};
use crate::jsonrpc::{JsonRpcTransport, RpcStream};
use rustls::pki_types::{CertificateDer, ServerName};
use rustls::{ClientConfig, RootCertStore};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, info};

/// PEM files used by the `ssl:` scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    /// Client certificate chain.
    pub cert: PathBuf,
    /// Client private key.
    pub private_key: PathBuf,
    /// CA bundle used to verify the server.
    pub ca_cert: PathBuf,
}

/// How to reach a database.
#[derive(Clone)]
pub enum TransportConfig {
    /// TLS over TCP with a client certificate.
    Ssl {
        host: String,
        port: u16,
        tls: Arc<ClientConfig>,
    },
    /// Plain TCP.
    Tcp { host: String, port: u16 },
    /// Local unix domain socket.
    Unix { path: PathBuf },
}

impl TransportConfig {
    /// Creates an `ssl:` transport, loading all TLS material immediately.
    ///
    /// `address` is `HOST:PORT`. Unreadable or empty PEM files fail here,
    /// not at connect time.
    pub fn ssl(address: &str, files: &TlsFiles) -> Result<Self> {
        let (host, port) = split_host_port(address)?;
        let tls = load_client_config(files)?;
        Ok(TransportConfig::Ssl {
            host,
            port,
            tls: Arc::new(tls),
        })
    }

    /// Creates a `tcp:` transport. `address` is `HOST:PORT`.
    pub fn tcp(address: &str) -> Result<Self> {
        let (host, port) = split_host_port(address)?;
        Ok(TransportConfig::Tcp { host, port })
    }

    /// Creates a `unix:` transport.
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        TransportConfig::Unix { path: path.into() }
    }

    /// Parses a full `scheme:target` address.
    ///
    /// TLS files are required for `ssl:` and ignored otherwise.
    pub fn from_address(address: &str, tls: Option<&TlsFiles>) -> Result<Self> {
        let (scheme, target) = address.split_once(':').ok_or_else(|| {
            OvsdbError::invalid_argument(format!("address {} has no scheme", address))
        })?;
        match scheme {
            "ssl" => {
                let files = tls.ok_or_else(|| {
                    OvsdbError::invalid_argument(format!(
                        "address {} requires certificate, key and CA files",
                        address
                    ))
                })?;
                Self::ssl(target, files)
            }
            "tcp" => Self::tcp(target),
            "unix" if !target.is_empty() => Ok(Self::unix(target)),
            _ => Err(OvsdbError::invalid_argument(format!(
                "unsupported database address {}",
                address
            ))),
        }
    }

    /// Returns the scheme name.
    pub fn scheme(&self) -> &'static str {
        match self {
            TransportConfig::Ssl { .. } => "ssl",
            TransportConfig::Tcp { .. } => "tcp",
            TransportConfig::Unix { .. } => "unix",
        }
    }

    /// Opens a connection and wraps it in a JSON-RPC transport.
    ///
    /// The connection is not re-established if it drops; every later
    /// transaction fails with a transport error.
    pub async fn connect(&self) -> Result<JsonRpcTransport> {
        let stream: Box<dyn RpcStream> = match self {
            TransportConfig::Tcp { host, port } => {
                Box::new(tcp_connect(host, *port).await?)
            }
            TransportConfig::Ssl { host, port, tls } => {
                let tcp = tcp_connect(host, *port).await?;
                let server_name = ServerName::try_from(host.clone()).map_err(|e| {
                    OvsdbError::Tls(format!("invalid server name {}: {}", host, e))
                })?;
                let tls_stream = TlsConnector::from(Arc::clone(tls))
                    .connect(server_name, tcp)
                    .await
                    .map_err(|e| OvsdbError::transport(format!("TLS handshake with {}: {}", self, e)))?;
                Box::new(tls_stream)
            }
            TransportConfig::Unix { path } => unix_connect(path).await?,
        };
        info!(address = %self, "Connected to database");
        Ok(JsonRpcTransport::new(self.to_string(), stream))
    }
}

impl fmt::Display for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportConfig::Ssl { host, port, .. } | TransportConfig::Tcp { host, port } => {
                if host.contains(':') {
                    write!(f, "{}:[{}]:{}", self.scheme(), host, port)
                } else {
                    write!(f, "{}:{}:{}", self.scheme(), host, port)
                }
            }
            TransportConfig::Unix { path } => write!(f, "unix:{}", path.display()),
        }
    }
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TransportConfig").field(&self.to_string()).finish()
    }
}

async fn tcp_connect(host: &str, port: u16) -> Result<TcpStream> {
    let stream = TcpStream::connect((host, port))
        .await
        .map_err(|e| OvsdbError::transport(format!("connect to {}:{}: {}", host, port, e)))?;
    stream
        .set_nodelay(true)
        .map_err(|e| OvsdbError::transport(format!("set TCP_NODELAY on {}:{}: {}", host, port, e)))?;
    Ok(stream)
}

#[cfg(unix)]
async fn unix_connect(path: &Path) -> Result<Box<dyn RpcStream>> {
    let stream = tokio::net::UnixStream::connect(path)
        .await
        .map_err(|e| OvsdbError::transport(format!("connect to {}: {}", path.display(), e)))?;
    Ok(Box::new(stream))
}

#[cfg(not(unix))]
async fn unix_connect(path: &Path) -> Result<Box<dyn RpcStream>> {
    Err(OvsdbError::transport(format!(
        "unix sockets are not supported on this platform: {}",
        path.display()
    )))
}

/// Splits `HOST:PORT`, accepting `[v6addr]:PORT`.
fn split_host_port(address: &str) -> Result<(String, u16)> {
    let invalid = || OvsdbError::invalid_argument(format!("expected HOST:PORT, got {}", address));
    let (host, port) = address.rsplit_once(':').ok_or_else(invalid)?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() {
        return Err(invalid());
    }
    let port = port.parse::<u16>().map_err(|_| invalid())?;
    Ok((host.to_string(), port))
}

fn open_pem(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| OvsdbError::Tls(format!("failed to open {}: {}", path.display(), e)))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = open_pem(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| OvsdbError::Tls(format!("failed to parse {}: {}", path.display(), e)))?;
    if certs.is_empty() {
        return Err(OvsdbError::Tls(format!(
            "no certificates found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

fn load_client_config(files: &TlsFiles) -> Result<ClientConfig> {
    let certs = load_certs(&files.cert)?;

    let mut key_reader = open_pem(&files.private_key)?;
    let private_key = rustls_pemfile::private_key(&mut key_reader)
        .map_err(|e| {
            OvsdbError::Tls(format!(
                "failed to parse {}: {}",
                files.private_key.display(),
                e
            ))
        })?
        .ok_or_else(|| {
            OvsdbError::Tls(format!(
                "no private key found in {}",
                files.private_key.display()
            ))
        })?;

    let mut roots = RootCertStore::empty();
    for ca in load_certs(&files.ca_cert)? {
        roots
            .add(ca)
            .map_err(|e| OvsdbError::Tls(format!("invalid CA certificate: {}", e)))?;
    }

    debug!(
        cert = %files.cert.display(),
        ca_cert = %files.ca_cert.display(),
        "Loaded TLS client material"
    );

    ClientConfig::builder_with_provider(Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| OvsdbError::Tls(e.to_string()))?
        .with_root_certificates(roots)
        .with_client_auth_cert(certs, private_key)
        .map_err(|e| OvsdbError::Tls(e.to_string()))
}
