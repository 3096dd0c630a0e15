use crate::{DrivelineError, DrivelineResult};
use url::Url;

/// An immutable description of the server endpoint.
///
/// Built from a URL with scheme `ws`, `wss`, `http`, or `https`; the
/// WebSocket schemes are rewritten to their HTTP counterparts for the
/// upgrade request. `wss`/`https` endpoints use TLS.
///
/// ```rust,no_run
/// use driveline::IntoConnectParams;
/// let params = "wss://driveline.example.com/v1".into_connect_params().unwrap();
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConnectParams {
    host: String,
    port: u16,
    target: String,
    use_tls: bool,
}

impl ConnectParams {
    /// The server's host name or address.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The server's port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port`, as used for the TCP connect.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether the endpoint requires TLS.
    pub fn is_tls(&self) -> bool {
        self.use_tls
    }

    // The request target of the upgrade GET (path plus query).
    pub(crate) fn request_target(&self) -> &str {
        &self.target
    }
}

impl std::fmt::Display for ConnectParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}://{}:{}{}",
            if self.use_tls { "wss" } else { "ws" },
            self.host,
            self.port,
            self.target,
        )
    }
}

/// A trait implemented by types that can be converted into a `ConnectParams`.
pub trait IntoConnectParams {
    fn into_connect_params(self) -> DrivelineResult<ConnectParams>;
}

impl IntoConnectParams for ConnectParams {
    fn into_connect_params(self) -> DrivelineResult<ConnectParams> {
        Ok(self)
    }
}

impl IntoConnectParams for &str {
    fn into_connect_params(self) -> DrivelineResult<ConnectParams> {
        Url::parse(self)
            .map_err(DrivelineError::conn_params)?
            .into_connect_params()
    }
}

impl IntoConnectParams for String {
    fn into_connect_params(self) -> DrivelineResult<ConnectParams> {
        self.as_str().into_connect_params()
    }
}

impl IntoConnectParams for Url {
    fn into_connect_params(self) -> DrivelineResult<ConnectParams> {
        let use_tls = match self.scheme() {
            "ws" | "http" => false,
            "wss" | "https" => true,
            _ => return Err(DrivelineError::InvalidProtocolScheme),
        };
        let host = self
            .host_str()
            .ok_or(DrivelineError::InvalidProtocolScheme)?
            .to_owned();
        let port = self
            .port_or_known_default()
            .unwrap_or(if use_tls { 443 } else { 80 });
        let mut target = if self.path().is_empty() {
            "/".to_owned()
        } else {
            self.path().to_owned()
        };
        if let Some(query) = self.query() {
            target.push('?');
            target.push_str(query);
        }
        Ok(ConnectParams {
            host,
            port,
            target,
            use_tls,
        })
    }
}
