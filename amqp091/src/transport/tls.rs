//! TLS connectors for `amqps` URIs

use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};

use crate::connection::OpenError;

/// TLS stream produced by the enabled backend
#[cfg(feature = "rustls")]
pub(crate) type TlsStream<Io> = tokio_rustls::client::TlsStream<Io>;

/// TLS stream produced by the enabled backend
#[cfg(all(feature = "native-tls", not(feature = "rustls")))]
pub(crate) type TlsStream<Io> = tokio_native_tls::TlsStream<Io>;

/// Perform the TLS handshake using the webpki root certificates
#[cfg(feature = "rustls")]
pub(crate) async fn connect<Io>(domain: &str, stream: Io) -> Result<TlsStream<Io>, OpenError>
where
    Io: AsyncRead + AsyncWrite + Unpin,
{
    use std::sync::Arc;

    use librustls::{pki_types::ServerName, ClientConfig, RootCertStore};
    use tokio_rustls::TlsConnector;

    let mut root_cert_store = RootCertStore::empty();
    root_cert_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = ClientConfig::builder()
        .with_root_certificates(root_cert_store)
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));
    let domain = ServerName::try_from(domain.to_string())
        .map_err(|_| OpenError::InvalidDomain(domain.to_string()))?;
    connector
        .connect(domain, stream)
        .await
        .map_err(OpenError::Io)
}

/// Perform the TLS handshake with the platform's native TLS implementation
#[cfg(all(feature = "native-tls", not(feature = "rustls")))]
pub(crate) async fn connect<Io>(domain: &str, stream: Io) -> Result<TlsStream<Io>, OpenError>
where
    Io: AsyncRead + AsyncWrite + Unpin,
{
    let connector = libnative_tls::TlsConnector::new()
        .map_err(|err| OpenError::Tls(err.to_string()))?;
    let connector = tokio_native_tls::TlsConnector::from(connector);
    connector
        .connect(domain, stream)
        .await
        .map_err(|err| OpenError::Tls(err.to_string()))
}

/// Open a TCP connection and layer TLS over it
pub(crate) async fn connect_tcp(
    host: &str,
    port: u16,
    domain: &str,
) -> Result<TlsStream<TcpStream>, OpenError> {
    let stream = TcpStream::connect((host, port)).await?;
    connect(domain, stream).await
}
