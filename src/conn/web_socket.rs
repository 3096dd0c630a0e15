//! The reconnecting, message-framed, backpressured transport.
//!
//! A supervisor task owns the connect/reconnect cycle. Once a connection
//! is established, a reader and a writer run as concurrently-polled halves
//! of the session; either one failing cancels the other, after which the
//! supervisor fires `on_disconnect` and re-enters the reconnect cycle with
//! capped exponential backoff. Outgoing frames queue in a bounded channel;
//! senders block when it is full.

pub(crate) mod frame;
mod upgrade;

use crate::conn::tcp_client::{BoxedReader, BoxedWriter};
use crate::conn::{ConnectParams, ConnectionConfiguration, TcpClient};
use crate::{DrivelineError, DrivelineResult};
use async_trait::async_trait;
use frame::OpCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

const OUTPUT_BUFFER_SIZE: usize = 32 * 1024 * 1024;
const READ_BUFFER_SIZE: usize = 1024 * 1024 + 65536 + 1024;

/// Lifecycle callbacks fired from the transport's own tasks.
///
/// `on_failure` is terminal: it is fired exactly once, after which no
/// further callbacks arrive. Handlers must not block indefinitely, as
/// blocking one stalls all subsequent callbacks.
#[async_trait]
pub(crate) trait TransportHandler: Send + Sync {
    async fn on_connect(&self);
    async fn on_disconnect(&self);
    async fn on_failure(&self, err: DrivelineError);
    async fn on_message(&self, frame: Vec<u8>);
    fn on_error(&self, err: DrivelineError);
}

/// The session-facing handle of the transport.
#[derive(Debug)]
pub(crate) struct WebSocket {
    frames: mpsc::Sender<Vec<u8>>,
    shutdown: CancellationToken,
}

impl WebSocket {
    /// Connects and spawns the supervisor. Returns once the first
    /// connection attempt has succeeded, or with the terminal error if the
    /// reconnect budget is exhausted first.
    pub(crate) async fn open(
        params: ConnectParams,
        config: &ConnectionConfiguration,
        handler: Arc<dyn TransportHandler>,
    ) -> DrivelineResult<Self> {
        let (frames, data_rx) = mpsc::channel(config.max_in_flight());
        let (pong_tx, pong_rx) = mpsc::channel(1);
        let shutdown = CancellationToken::new();
        let (ready_tx, ready_rx) = oneshot::channel();

        let supervisor = Supervisor {
            params,
            config: config.clone(),
            handler,
            data_rx,
            pong_tx,
            pong_rx,
            shutdown: shutdown.clone(),
        };
        tokio::spawn(supervisor.run(ready_tx));

        match ready_rx.await {
            Ok(Ok(())) => Ok(Self { frames, shutdown }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(DrivelineError::Closed),
        }
    }

    /// Enqueues one application frame; blocks while the queue is full.
    pub(crate) async fn write(&self, frame: Vec<u8>) -> DrivelineResult<()> {
        self.frames
            .send(frame)
            .await
            .map_err(|_| DrivelineError::Closed)
    }

    /// Stops the supervisor and closes the connection. Idempotent.
    pub(crate) fn close(&self) {
        self.shutdown.cancel();
    }
}

struct Supervisor {
    params: ConnectParams,
    config: ConnectionConfiguration,
    handler: Arc<dyn TransportHandler>,
    data_rx: mpsc::Receiver<Vec<u8>>,
    pong_tx: mpsc::Sender<Vec<u8>>,
    pong_rx: mpsc::Receiver<Vec<u8>>,
    shutdown: CancellationToken,
}

type Ready = oneshot::Sender<DrivelineResult<()>>;

impl Supervisor {
    async fn run(mut self, ready: Ready) {
        let mut ready = Some(ready);
        let mut attempt: u32 = 0;
        loop {
            if self.config.max_reconnect() >= 0
                && attempt >= self.config.max_reconnect().unsigned_abs()
            {
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Err(DrivelineError::MaxReconnect));
                }
                self.handler.on_failure(DrivelineError::MaxReconnect).await;
                return;
            }

            let delay = reconnect_delay(
                attempt,
                self.config.reconnect_wait(),
                self.config.max_reconnect_wait(),
            );
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    self.terminate(ready.take()).await;
                    return;
                }
                () = tokio::time::sleep(delay) => {}
            }

            let connected = tokio::select! {
                () = self.shutdown.cancelled() => {
                    self.terminate(ready.take()).await;
                    return;
                }
                c = tokio::time::timeout(self.config.connect_timeout(), self.connect()) => c,
            };
            let (reader, writer) = match connected {
                Ok(Ok(halves)) => halves,
                Ok(Err(e)) => {
                    debug!("connect attempt {attempt} to {} failed: {e}", self.params);
                    attempt += 1;
                    continue;
                }
                Err(_elapsed) => {
                    debug!("connect attempt {attempt} to {} timed out", self.params);
                    attempt += 1;
                    continue;
                }
            };

            if let Some(tx) = ready.take() {
                let _ = tx.send(Ok(()));
            }
            self.handler.on_connect().await;
            self.run_session(reader, writer).await;
            self.handler.on_disconnect().await;
            if self.shutdown.is_cancelled() {
                self.handler.on_failure(DrivelineError::Closed).await;
                return;
            }
            // the first retry after a lost session backs off by half a wait
            attempt = 1;
        }
    }

    async fn terminate(&self, ready: Option<Ready>) {
        if let Some(tx) = ready {
            let _ = tx.send(Err(DrivelineError::Closed));
        }
        self.handler.on_failure(DrivelineError::Closed).await;
    }

    async fn connect(
        &self,
    ) -> DrivelineResult<(BufReader<BoxedReader>, BufWriter<BoxedWriter>)> {
        let (reader, writer) = TcpClient::try_new(&self.params).await?.into_split();
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, reader);
        let mut writer = BufWriter::with_capacity(OUTPUT_BUFFER_SIZE, writer);
        upgrade::perform(&mut reader, &mut writer, &self.params, &self.config).await?;
        debug!("connected to {}", self.params);
        Ok((reader, writer))
    }

    // Runs reader and writer until one of them ends, which cancels the
    // other. Reports the causing error, if any, to the error sink.
    async fn run_session(
        &mut self,
        mut reader: BufReader<BoxedReader>,
        mut writer: BufWriter<BoxedWriter>,
    ) {
        let handler = Arc::clone(&self.handler);
        let pong_tx = self.pong_tx.clone();
        let result = tokio::select! {
            r = reader_loop(&mut reader, handler.as_ref(), &pong_tx, &self.shutdown) => r,
            r = writer_loop(&mut writer, &mut self.data_rx, &mut self.pong_rx, &self.shutdown) => r,
        };
        if let Err(err) = result {
            self.handler.on_error(err);
        }
    }
}

/// Delay before reconnection attempt `attempt`:
/// `reconnect_wait · (2^attempt − 1) / 2`, capped at `max_wait`.
fn reconnect_delay(attempt: u32, wait: Duration, max_wait: Duration) -> Duration {
    let factor = (1_u64 << attempt.min(32)) - 1;
    let delay = wait
        .saturating_mul(u32::try_from(factor).unwrap_or(u32::MAX))
        .div_f64(2.0);
    delay.min(max_wait)
}

async fn reader_loop(
    reader: &mut BufReader<BoxedReader>,
    handler: &dyn TransportHandler,
    pong_tx: &mpsc::Sender<Vec<u8>>,
    shutdown: &CancellationToken,
) -> DrivelineResult<()> {
    loop {
        let (op_code, payload) = tokio::select! {
            () = shutdown.cancelled() => return Ok(()),
            f = frame::read_frame(reader) => f?,
        };
        match op_code {
            OpCode::Binary => handler.on_message(payload).await,
            OpCode::Close => {
                debug!("server closed the connection");
                return Ok(());
            }
            OpCode::Ping => {
                if pong_tx.send(payload).await.is_err() {
                    return Ok(());
                }
            }
            OpCode::Pong => {}
            _ => handler.on_error(DrivelineError::InvalidFrameType),
        }
    }
}

async fn writer_loop<W>(
    writer: &mut W,
    data_rx: &mut mpsc::Receiver<Vec<u8>>,
    pong_rx: &mut mpsc::Receiver<Vec<u8>>,
    shutdown: &CancellationToken,
) -> DrivelineResult<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            () = shutdown.cancelled() => return Ok(()),
            pong = pong_rx.recv() => {
                let Some(pong) = pong else { return Ok(()) };
                frame::write_frame(writer, OpCode::Pong, &pong).await?;
                writer.flush().await?;
            }
            data = data_rx.recv() => {
                let Some(data) = data else { return Ok(()) };
                frame::write_frame(writer, OpCode::Binary, &data).await?;
                // coalesce whatever else is already queued into one flush
                while let Ok(next) = data_rx.try_recv() {
                    frame::write_frame(writer, OpCode::Binary, &next).await?;
                }
                writer.flush().await?;
            }
        }
    }
}
