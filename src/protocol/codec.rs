// src/protocol/codec.rs
//
// SLP framing primitives: protocol varints, length-prefixed packets and
// UTF-8 strings. Everything multi-byte and fixed-width is big-endian.
use std::fmt;
use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

/// A varint never spans more than 5 bytes (32-bit payload, 7 bits per byte).
const VARINT_MAX_BYTES: usize = 5;

#[derive(Debug)]
pub enum CodecError {
    /// Varint ran past 5 bytes without a terminating byte.
    MalformedVarInt,
    /// The stream closed in the middle of a declared frame.
    IncompletePacket,
    /// The declared frame length exceeds the configured ceiling.
    PacketTooLarge { declared: usize, max: usize },
    /// A string field held invalid UTF-8.
    InvalidString,
    Io(io::Error),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedVarInt => write!(f, "varint exceeds 5 bytes"),
            Self::IncompletePacket => write!(f, "stream closed mid-packet"),
            Self::PacketTooLarge { declared, max } => {
                write!(f, "declared packet length {} exceeds ceiling {}", declared, max)
            }
            Self::InvalidString => write!(f, "string field is not valid UTF-8"),
            Self::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for CodecError {}

impl From<io::Error> for CodecError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            CodecError::IncompletePacket
        } else {
            CodecError::Io(e)
        }
    }
}

/// A decoded frame: packet id plus its raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: i32,
    pub payload: Vec<u8>,
}

/// Appends `value` to `buf` in protocol varint encoding.
pub fn write_var_int(buf: &mut Vec<u8>, value: i32) {
    let mut remaining = value as u32;
    loop {
        let byte = (remaining & 0x7f) as u8;
        remaining >>= 7;
        if remaining == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

/// Decodes a varint from the front of `buf`, returning the value and the
/// number of bytes consumed.
pub fn read_var_int_slice(buf: &[u8]) -> Result<(i32, usize), CodecError> {
    let mut value: u32 = 0;
    for (i, &byte) in buf.iter().enumerate() {
        if i >= VARINT_MAX_BYTES {
            return Err(CodecError::MalformedVarInt);
        }
        value |= u32::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value as i32, i + 1));
        }
    }
    if buf.len() >= VARINT_MAX_BYTES {
        Err(CodecError::MalformedVarInt)
    } else {
        Err(CodecError::IncompletePacket)
    }
}

/// Reads a varint off an async stream, one byte at a time.
pub async fn read_var_int<R: AsyncRead + Unpin>(reader: &mut R) -> Result<i32, CodecError> {
    let mut value: u32 = 0;
    for i in 0..VARINT_MAX_BYTES {
        let byte = reader.read_u8().await?;
        value |= u32::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value as i32);
        }
    }
    Err(CodecError::MalformedVarInt)
}

/// Reads one length-prefixed frame. The declared length is validated against
/// `max_len` before any payload buffer is allocated.
pub async fn read_packet<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_len: usize,
) -> Result<Packet, CodecError> {
    let declared = read_var_int(reader).await?;
    if declared < 1 {
        return Err(CodecError::IncompletePacket);
    }
    let declared = declared as usize;
    if declared > max_len {
        return Err(CodecError::PacketTooLarge { declared, max: max_len });
    }

    let mut frame = vec![0u8; declared];
    reader.read_exact(&mut frame).await?;

    let (id, id_len) = read_var_int_slice(&frame)?;
    Ok(Packet {
        id,
        payload: frame.split_off(id_len),
    })
}

/// Frames `payload` under `id`: varint total length, varint id, payload.
pub fn write_packet(id: i32, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(payload.len() + VARINT_MAX_BYTES);
    write_var_int(&mut body, id);
    body.extend_from_slice(payload);

    let mut framed = Vec::with_capacity(body.len() + VARINT_MAX_BYTES);
    write_var_int(&mut framed, body.len() as i32);
    framed.extend_from_slice(&body);
    framed
}

/// Appends a varint-length-prefixed UTF-8 string.
pub fn write_string(buf: &mut Vec<u8>, value: &str) {
    write_var_int(buf, value.len() as i32);
    buf.extend_from_slice(value.as_bytes());
}

/// Decodes a length-prefixed string from the front of `buf`, returning the
/// string and the bytes consumed.
pub fn read_string_slice(buf: &[u8]) -> Result<(String, usize), CodecError> {
    let (len, len_bytes) = read_var_int_slice(buf)?;
    if len < 0 {
        return Err(CodecError::IncompletePacket);
    }
    let len = len as usize;
    let rest = &buf[len_bytes..];
    if rest.len() < len {
        return Err(CodecError::IncompletePacket);
    }
    let text = std::str::from_utf8(&rest[..len])
        .map_err(|_| CodecError::InvalidString)?
        .to_string();
    Ok((text, len_bytes + len))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn read_packet_from(bytes: &[u8], max_len: usize) -> Result<Packet, CodecError> {
        let mut cursor = std::io::Cursor::new(bytes.to_vec());
        read_packet(&mut cursor, max_len).await
    }

    #[test]
    fn varint_round_trip() {
        for value in [0, 1, 127, 128, 65536, i32::MAX] {
            let mut buf = Vec::new();
            write_var_int(&mut buf, value);
            let (decoded, used) = read_var_int_slice(&buf).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(used, buf.len());
        }
    }

    #[test]
    fn varint_negative_uses_five_bytes() {
        let mut buf = Vec::new();
        write_var_int(&mut buf, -1);
        assert_eq!(buf.len(), 5);
        let (decoded, _) = read_var_int_slice(&buf).unwrap();
        assert_eq!(decoded, -1);
    }

    #[test]
    fn varint_rejects_six_continuation_bytes() {
        let buf = [0x80u8; 6];
        assert!(matches!(
            read_var_int_slice(&buf),
            Err(CodecError::MalformedVarInt)
        ));
    }

    #[tokio::test]
    async fn packet_round_trip() {
        for len in [0usize, 1, 1024, 1 << 17] {
            let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let framed = write_packet(0x42, &payload);
            let packet = read_packet_from(&framed, 1 << 21).await.unwrap();
            assert_eq!(packet.id, 0x42);
            assert_eq!(packet.payload, payload);
        }
    }

    #[tokio::test]
    async fn oversized_declared_length_is_rejected_before_reading() {
        // A frame claiming ~1 GiB with no body behind it. The ceiling check
        // must fire on the declared length alone.
        let mut bytes = Vec::new();
        write_var_int(&mut bytes, 1 << 30);
        let err = read_packet_from(&bytes, 1 << 21).await.unwrap_err();
        assert!(matches!(err, CodecError::PacketTooLarge { declared, .. } if declared == 1 << 30));
    }

    #[tokio::test]
    async fn truncated_frame_is_incomplete() {
        let framed = write_packet(0x00, &[1, 2, 3, 4]);
        let err = read_packet_from(&framed[..framed.len() - 2], 1 << 21)
            .await
            .unwrap_err();
        assert!(matches!(err, CodecError::IncompletePacket));
    }

    #[test]
    fn string_round_trip() {
        let mut buf = Vec::new();
        write_string(&mut buf, "mc.example.com");
        let (text, used) = read_string_slice(&buf).unwrap();
        assert_eq!(text, "mc.example.com");
        assert_eq!(used, buf.len());
    }
}
