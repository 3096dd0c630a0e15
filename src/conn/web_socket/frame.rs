//! WebSocket frame encoding and decoding.
//!
//! One application message maps to one binary frame with FIN=1 and MASK=0;
//! client-side masking is intentionally not performed, the server accepts
//! unmasked frames over trusted channels. The length field is 7, 16, or 64
//! bits, big-endian, selected minimally.

use crate::{DrivelineError, DrivelineResult};
use byteorder::{BigEndian, ByteOrder};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

// Inbound frames above this size are treated as framing violations.
pub(crate) const MAX_INPUT_FRAME: u64 = 16 * 1024 * 1024;

const FIN: u8 = 0x80;
const MASKED: u8 = 0x80;
const OPCODE_MASK: u8 = 0x0F;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpCode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
    Other(u8),
}

impl From<u8> for OpCode {
    fn from(code: u8) -> Self {
        match code {
            0x0 => Self::Continuation,
            0x1 => Self::Text,
            0x2 => Self::Binary,
            0x8 => Self::Close,
            0x9 => Self::Ping,
            0xA => Self::Pong,
            other => Self::Other(other),
        }
    }
}

impl OpCode {
    fn as_u8(self) -> u8 {
        match self {
            Self::Continuation => 0x0,
            Self::Text => 0x1,
            Self::Binary => 0x2,
            Self::Close => 0x8,
            Self::Ping => 0x9,
            Self::Pong => 0xA,
            Self::Other(code) => code & OPCODE_MASK,
        }
    }
}

fn map_eof(e: std::io::Error) -> DrivelineError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        DrivelineError::UnexpectedEndOfStream
    } else {
        e.into()
    }
}

/// Reads one frame, rejecting masked, fragmented, and oversized input.
pub(crate) async fn read_frame<R>(reader: &mut R) -> DrivelineResult<(OpCode, Vec<u8>)>
where
    R: AsyncRead + Unpin,
{
    let mut hdr = [0_u8; 2];
    reader.read_exact(&mut hdr).await.map_err(map_eof)?;

    let fin = hdr[0] & FIN != 0;
    let masked = hdr[1] & MASKED != 0;
    if masked || !fin {
        return Err(DrivelineError::InvalidWebSocketFrame);
    }
    let op_code = OpCode::from(hdr[0] & OPCODE_MASK);

    let mut frame_len = u64::from(hdr[1] & 0x7F);
    if frame_len == 126 {
        frame_len = u64::from(reader.read_u16().await.map_err(map_eof)?);
    } else if frame_len == 127 {
        frame_len = reader.read_u64().await.map_err(map_eof)?;
    }
    if frame_len > MAX_INPUT_FRAME {
        return Err(DrivelineError::InvalidWebSocketFrame);
    }

    let mut frame = vec![0_u8; frame_len as usize];
    reader.read_exact(&mut frame).await.map_err(map_eof)?;
    Ok((op_code, frame))
}

/// Writes one final, unmasked frame. The caller flushes.
pub(crate) async fn write_frame<W>(
    writer: &mut W,
    op_code: OpCode,
    frame: &[u8],
) -> DrivelineResult<()>
where
    W: AsyncWrite + Unpin,
{
    let mut hdr = [0_u8; 10];
    hdr[0] = FIN | op_code.as_u8();
    let len = frame.len() as u64;
    let hdr_len = match len {
        0..=125 => {
            hdr[1] = len as u8;
            2
        }
        126..=0xFFFF => {
            hdr[1] = 126;
            BigEndian::write_u16(&mut hdr[2..4], len as u16);
            4
        }
        _ => {
            hdr[1] = 127;
            BigEndian::write_u64(&mut hdr[2..10], len);
            10
        }
    };
    writer.write_all(&hdr[..hdr_len]).await?;
    writer.write_all(frame).await?;
    Ok(())
}
