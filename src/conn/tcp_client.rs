use crate::conn::ConnectParams;
use crate::{DrivelineError, DrivelineResult};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::{client::TlsStream, TlsConnector};

pub(crate) type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub(crate) type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

// A tcp connection, with or without TLS.
#[derive(Debug)]
pub(crate) enum TcpClient {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl TcpClient {
    // Constructs a tcp connection, with or without TLS, depending on the
    // given connection parameters.
    pub(crate) async fn try_new(params: &ConnectParams) -> DrivelineResult<Self> {
        let start = Instant::now();
        trace!("TcpClient: connecting to {:?}", params.addr());

        let tcp_stream = TcpStream::connect(params.addr()).await?;
        let tcp_client = if params.is_tls() {
            let server_name = ServerName::try_from(params.host().to_owned())
                .map_err(DrivelineError::conn_params)?;
            let connector = TlsConnector::from(Arc::new(tls_client_config()));
            Self::Tls(Box::new(connector.connect(server_name, tcp_stream).await?))
        } else {
            Self::Plain(tcp_stream)
        };

        trace!(
            "connection of type {} is initialized ({} µs)",
            tcp_client.s_type(),
            Instant::now().duration_since(start).as_micros(),
        );
        Ok(tcp_client)
    }

    // Returns a descriptor of the chosen type
    pub(crate) fn s_type(&self) -> &'static str {
        match self {
            Self::Plain(_) => "Plain TCP",
            Self::Tls(_) => "TLS TCP",
        }
    }

    pub(crate) fn into_split(self) -> (BoxedReader, BoxedWriter) {
        match self {
            Self::Plain(stream) => {
                let (reader, writer) = stream.into_split();
                (Box::new(reader), Box::new(writer))
            }
            Self::Tls(stream) => {
                let (reader, writer) = tokio::io::split(*stream);
                (Box::new(reader), Box::new(writer))
            }
        }
    }
}

fn tls_client_config() -> ClientConfig {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}
