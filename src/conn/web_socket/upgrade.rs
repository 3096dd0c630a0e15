//! The HTTP GET upgrade that turns a fresh TCP connection into a
//! message-framed duplex channel.

use crate::conn::{ConnectParams, ConnectionConfiguration};
use crate::{DrivelineError, DrivelineResult};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const WEBSOCKET_KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";
const WEBSOCKET_PROTOCOL: &str = "driveline";
const WEBSOCKET_VERSION: &str = "13";

// Upper bound on the upgrade response, status line and headers included.
const MAX_RESPONSE_SIZE: usize = 16 * 1024;

/// Performs the upgrade handshake on a fresh connection.
///
/// Anything other than a `101` response with matching `Connection` and
/// `Upgrade` headers fails with
/// [`Handshake`](crate::DrivelineError::Handshake). The server's
/// `Sec-WebSocket-Accept` value is not verified.
pub(crate) async fn perform<R, W>(
    reader: &mut R,
    writer: &mut W,
    params: &ConnectParams,
    config: &ConnectionConfiguration,
) -> DrivelineResult<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(upgrade_request(params, config).as_bytes())
        .await?;
    writer.flush().await?;

    let mut budget = MAX_RESPONSE_SIZE;
    let status_line = read_header_line(reader, &mut budget).await?;
    let mut status_fields = status_line.split_whitespace();
    if !status_line.starts_with("HTTP/1.1") || status_fields.nth(1) != Some("101") {
        debug!("upgrade refused: {status_line:?}");
        return Err(DrivelineError::Handshake);
    }

    let mut connection_ok = false;
    let mut upgrade_ok = false;
    loop {
        let line = read_header_line(reader, &mut budget).await?;
        if line.is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(DrivelineError::Handshake);
        };
        let value = value.trim();
        if name.eq_ignore_ascii_case("connection") {
            connection_ok = value.eq_ignore_ascii_case("upgrade");
        } else if name.eq_ignore_ascii_case("upgrade") {
            upgrade_ok = value.eq_ignore_ascii_case("websocket");
        }
    }
    if !connection_ok || !upgrade_ok {
        return Err(DrivelineError::Handshake);
    }
    trace!("upgrade to {WEBSOCKET_PROTOCOL} completed");
    Ok(())
}

fn upgrade_request(params: &ConnectParams, config: &ConnectionConfiguration) -> String {
    let mut request = format!(
        "GET {} HTTP/1.1\r\n\
         Host: {}\r\n\
         Connection: Upgrade\r\n\
         Upgrade: websocket\r\n\
         Sec-WebSocket-Key: {WEBSOCKET_KEY}\r\n\
         Sec-WebSocket-Protocol: {WEBSOCKET_PROTOCOL}\r\n\
         Sec-WebSocket-Version: {WEBSOCKET_VERSION}\r\n\
         User-Agent: driveline/{} rust\r\n",
        params.request_target(),
        params.addr(),
        env!("CARGO_PKG_VERSION"),
    );
    for (name, value) in config.http_headers() {
        request.push_str(name);
        request.push_str(": ");
        request.push_str(value);
        request.push_str("\r\n");
    }
    request.push_str("\r\n");
    request
}

// Reads one CRLF-terminated line, charging it against the response budget.
async fn read_header_line<R>(reader: &mut R, budget: &mut usize) -> DrivelineResult<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let mut limited = (&mut *reader).take(*budget as u64);
    let read = limited.read_until(b'\n', &mut line).await?;
    if read == 0 || !line.ends_with(b"\n") {
        return Err(DrivelineError::Handshake);
    }
    *budget -= read;
    while line.last().is_some_and(|b| *b == b'\n' || *b == b'\r') {
        line.pop();
    }
    String::from_utf8(line).map_err(|_| DrivelineError::Handshake)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IntoConnectParams;
    use tokio::io::{AsyncReadExt, BufReader};

    async fn run_handshake(response: &str) -> (DrivelineResult<()>, String) {
        let (client, mut server) = tokio::io::duplex(64 * 1024);
        let (client_read, mut client_write) = tokio::io::split(client);
        let mut client_read = BufReader::new(client_read);

        server.write_all(response.as_bytes()).await.unwrap();
        let params = "ws://localhost:8080/v1".into_connect_params().unwrap();
        let result = perform(
            &mut client_read,
            &mut client_write,
            &params,
            &ConnectionConfiguration::default(),
        )
        .await;

        let mut sent = vec![0_u8; 4096];
        let n = server.read(&mut sent).await.unwrap();
        sent.truncate(n);
        (result, String::from_utf8(sent).unwrap())
    }

    #[tokio::test]
    async fn accepts_switching_protocols() {
        let (result, request) = run_handshake(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             \r\n",
        )
        .await;
        result.unwrap();
        assert!(request.starts_with("GET /v1 HTTP/1.1\r\n"));
        assert!(request.contains("Host: localhost:8080\r\n"));
        assert!(request.contains("Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n"));
        assert!(request.contains("Sec-WebSocket-Protocol: driveline\r\n"));
        assert!(request.contains("Sec-WebSocket-Version: 13\r\n"));
        assert!(request.contains("User-Agent: driveline/"));
        assert!(request.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn header_matching_is_case_insensitive() {
        let (result, _) = run_handshake(
            "HTTP/1.1 101 Switching Protocols\r\n\
             upgrade: WebSocket\r\n\
             connection: upgrade\r\n\
             \r\n",
        )
        .await;
        result.unwrap();
    }

    #[tokio::test]
    async fn rejects_non_101_status() {
        let (result, _) =
            run_handshake("HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\n").await;
        assert!(matches!(result, Err(DrivelineError::Handshake)));
    }

    #[tokio::test]
    async fn rejects_missing_upgrade_headers() {
        let (result, _) = run_handshake(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Connection: Upgrade\r\n\
             \r\n",
        )
        .await;
        assert!(matches!(result, Err(DrivelineError::Handshake)));
    }

    #[tokio::test]
    async fn sends_configured_extra_headers() {
        let (client, mut server) = tokio::io::duplex(64 * 1024);
        let (client_read, mut client_write) = tokio::io::split(client);
        let mut client_read = BufReader::new(client_read);
        server
            .write_all(
                b"HTTP/1.1 101 x\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n",
            )
            .await
            .unwrap();

        let params = "ws://localhost:8080".into_connect_params().unwrap();
        let config = ConnectionConfiguration::default()
            .with_http_header("Authorization", "Bearer token");
        perform(&mut client_read, &mut client_write, &params, &config)
            .await
            .unwrap();

        let mut sent = vec![0_u8; 4096];
        let n = server.read(&mut sent).await.unwrap();
        sent.truncate(n);
        let request = String::from_utf8(sent).unwrap();
        assert!(request.contains("Authorization: Bearer token\r\n"));
    }
}
