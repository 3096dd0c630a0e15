use thiserror::Error;

/// A list specifying the categories of [`DrivelineError`](crate::DrivelineError).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DrivelineError {
    /// The server refused or mangled the WebSocket upgrade.
    #[error("invalid handshake")]
    Handshake,

    /// The endpoint URL scheme is not one of `ws`, `wss`, `http`, `https`.
    #[error("URL scheme must be ws, wss, http, or https")]
    InvalidProtocolScheme,

    /// A received WebSocket frame violates the framing rules
    /// (masked, fragmented, or oversized).
    #[error("invalid WebSocket frame")]
    InvalidWebSocketFrame,

    /// A received WebSocket frame carries an opcode the client does not handle.
    #[error("unexpected frame type received")]
    InvalidFrameType,

    /// The connection ended in the middle of a frame.
    #[error("unexpected end of stream")]
    UnexpectedEndOfStream,

    /// The maximum number of consecutive reconnection attempts was reached.
    #[error("maximum reconnection attempts reached")]
    MaxReconnect,

    /// The connection is closed, either by `close()` or by the server.
    #[error("connection closed")]
    Closed,

    /// A server message could not be decoded.
    #[error("invalid server message")]
    InvalidServerMessage,

    /// A well-formed reply arrived for a consumer id that is not (or no
    /// longer) registered. Reported to the error sink only.
    #[error("received message for unknown consumer {0}")]
    UnknownConsumer(u64),

    /// The caller's cancellation signal fired before the operation completed.
    #[error("operation cancelled")]
    Cancelled,

    /// The server failed the operation; the text is propagated verbatim.
    #[error("server error: {0}")]
    ServerError(String),

    /// Erroneous connection parameters, e.g. a malformed endpoint URL.
    #[error("erroneous connection parameters")]
    ConnParams {
        /// The causing error.
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// Error occured in communication with the server.
    #[error(transparent)]
    Io {
        /// The causing error.
        #[from]
        source: std::io::Error,
    },
}

/// Abbreviation of `Result<T, DrivelineError>`.
pub type DrivelineResult<T> = std::result::Result<T, DrivelineError>;

impl DrivelineError {
    pub(crate) fn conn_params<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ConnParams {
            source: Box::new(error),
        }
    }

    /// Returns the server-provided error text, if any.
    pub fn server_error(&self) -> Option<&str> {
        if let Self::ServerError(s) = self {
            Some(s)
        } else {
            None
        }
    }
}
