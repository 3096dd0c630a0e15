mod connection_configuration;
mod params;
mod tcp_client;
pub(crate) mod web_socket;

pub use connection_configuration::ConnectionConfiguration;
pub(crate) use connection_configuration::ErrorSink;
pub use params::{ConnectParams, IntoConnectParams};
pub(crate) use tcp_client::TcpClient;
