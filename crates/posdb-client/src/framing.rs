//! Length-prefixed framing of the backend channel.
//!
//! Every message is an 8-byte header followed by a UTF-8 JSON payload. The
//! header holds the payload length as u32 LE and the same length XORed with
//! [`LENGTH_XOR`], also u32 LE. Both halves are checked, and the length is
//! bounded, before any of the body is read.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProtocolError;

pub const LENGTH_XOR: u32 = 0xBD20_D595;
pub const MAX_MESSAGE_LENGTH: u32 = 4 * 1024 * 1024;
pub const HEADER_LEN: usize = 8;

pub fn encode_header(length: u32) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[..4].copy_from_slice(&length.to_le_bytes());
    header[4..].copy_from_slice(&(length ^ LENGTH_XOR).to_le_bytes());
    header
}

/// Validate a header and return the payload length.
pub fn decode_header(header: &[u8; HEADER_LEN]) -> Result<u32, ProtocolError> {
    let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let checksum = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

    if length ^ LENGTH_XOR != checksum {
        return Err(ProtocolError::Checksum { length, checksum });
    }
    if length > MAX_MESSAGE_LENGTH {
        return Err(ProtocolError::TooLong(length));
    }
    Ok(length)
}

/// Header and payload of one message.
pub fn encode_frame(payload: &str) -> Result<Vec<u8>, ProtocolError> {
    let bytes = payload.as_bytes();
    let length = u32::try_from(bytes.len())
        .ok()
        .filter(|len| *len <= MAX_MESSAGE_LENGTH)
        .ok_or(ProtocolError::Oversized(bytes.len()))?;

    let mut frame = Vec::with_capacity(HEADER_LEN + bytes.len());
    frame.extend_from_slice(&encode_header(length));
    frame.extend_from_slice(bytes);
    Ok(frame)
}

pub async fn write_frame<W>(writer: &mut W, payload: &str) -> Result<(), std::io::Error>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(payload)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    writer.write_all(&frame).await?;
    writer.flush().await
}

/// Read one full message. An empty payload is a valid empty string.
pub async fn read_frame<R>(reader: &mut R) -> Result<String, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    reader
        .read_exact(&mut header)
        .await
        .map_err(ProtocolError::ShortRead)?;

    let length = decode_header(&header)?;
    if length == 0 {
        return Ok(String::new());
    }

    let mut body = vec![0u8; length as usize];
    reader
        .read_exact(&mut body)
        .await
        .map_err(ProtocolError::ShortRead)?;

    Ok(String::from_utf8(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = encode_header(5);
        assert_eq!(&header[..4], &[5, 0, 0, 0]);
        assert_eq!(
            u32::from_le_bytes([header[4], header[5], header[6], header[7]]),
            5 ^ 3_173_045_653
        );
        assert_eq!(decode_header(&header).unwrap(), 5);
    }

    #[test]
    fn test_known_wire_header() {
        // 300-byte payload as written by the backend
        let header = [0x2C, 0x01, 0x00, 0x00, 0xB9, 0xD4, 0x20, 0xBD];
        assert_eq!(decode_header(&header).unwrap(), 300);
        assert_eq!(encode_header(300), header);

        let empty = [0x00, 0x00, 0x00, 0x00, 0x95, 0xD5, 0x20, 0xBD];
        assert_eq!(decode_header(&empty).unwrap(), 0);
    }

    #[test]
    fn test_bad_checksum_rejected() {
        let mut header = encode_header(10);
        header[7] ^= 0x01;
        assert!(matches!(
            decode_header(&header),
            Err(ProtocolError::Checksum { length: 10, .. })
        ));
    }

    #[test]
    fn test_oversized_rejected() {
        let header = encode_header(MAX_MESSAGE_LENGTH + 1);
        assert!(matches!(decode_header(&header), Err(ProtocolError::TooLong(_))));
        assert!(decode_header(&encode_header(MAX_MESSAGE_LENGTH)).is_ok());
    }

    #[tokio::test]
    async fn test_frame_round_trip() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        write_frame(&mut client, r#"{"command":"stats"}"#).await.unwrap();
        write_frame(&mut client, "").await.unwrap();

        assert_eq!(read_frame(&mut server).await.unwrap(), r#"{"command":"stats"}"#);
        assert_eq!(read_frame(&mut server).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_checksum_checked_before_body() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let mut header = encode_header(3);
        header[4] ^= 0xFF;
        // No body follows: a reader that waited for it would hang.
        client.write_all(&header).await.unwrap();

        let err = read_frame(&mut server).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Checksum { .. }));
    }

    #[tokio::test]
    async fn test_short_body() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&encode_header(10)).await.unwrap();
        client.write_all(b"abc").await.unwrap();
        drop(client);

        let err = read_frame(&mut server).await.unwrap_err();
        assert!(matches!(err, ProtocolError::ShortRead(_)));
    }
}
