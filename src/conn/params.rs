mod connect_params;

pub use connect_params::{ConnectParams, IntoConnectParams};
