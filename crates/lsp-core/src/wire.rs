//! Content-Length framing for JSON-RPC messages exchanged with an LSP subprocess.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::Error;

const CONTENT_LENGTH: &str = "content-length";

/// Serializes `body` as a single `Content-Length`-framed message and writes it in one shot.
///
/// Headers and body are concatenated into a single buffer before the write so a single
/// `write_all` call puts the whole frame on the wire atomically.
pub async fn write_message<W>(writer: &mut W, body: &serde_json::Value) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
{
    let payload = serde_json::to_vec(body)?;
    let mut framed = format!(
        "Content-Length: {}\r\nContent-Type: application/vscode-jsonrpc; charset=utf-8\r\n\r\n",
        payload.len()
    )
    .into_bytes();
    framed.extend_from_slice(&payload);
    writer.write_all(&framed).await.map_err(Error::Io)?;
    writer.flush().await.map_err(Error::Io)
}

/// Reads a single `Content-Length`-framed message from `reader`.
///
/// Returns `Ok(None)` on a clean EOF before any header bytes are read. Any other malformed
/// framing (missing/non-numeric/negative `Content-Length`, truncated body, invalid JSON) is a
/// [`Error::Protocol`].
pub async fn read_message<R>(reader: &mut BufReader<R>) -> Result<Option<serde_json::Value>, Error>
where
    R: AsyncRead + Unpin,
{
    use tokio::io::AsyncBufReadExt;

    let mut content_length: Option<usize> = None;
    let mut saw_any_header = false;

    loop {
        let mut line = String::new();
        let read = reader.read_line(&mut line).await.map_err(Error::Io)?;
        if read == 0 {
            if saw_any_header {
                return Err(Error::Protocol("connection closed mid-header".into()));
            }
            return Ok(None);
        }

        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }

        saw_any_header = true;
        let Some((key, value)) = trimmed.split_once(':') else {
            return Err(Error::Protocol(format!("malformed header line: {trimmed:?}")));
        };

        if key.trim().to_ascii_lowercase() == CONTENT_LENGTH {
            let value = value.trim();
            let parsed: i64 = value
                .parse()
                .map_err(|_| Error::Protocol(format!("non-numeric Content-Length: {value:?}")))?;
            if parsed < 0 {
                return Err(Error::Protocol(format!("negative Content-Length: {parsed}")));
            }
            content_length = Some(parsed as usize);
        }
    }

    let Some(length) = content_length else {
        return Err(Error::Protocol("missing Content-Length header".into()));
    };

    let mut body = vec![0u8; length];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|source| Error::Protocol(format!("truncated body: {source}")))?;

    let value = serde_json::from_slice(&body)
        .map_err(|source| Error::Protocol(format!("invalid JSON body: {source}")))?;
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader as TokioBufReader;

    #[tokio::test]
    async fn round_trips_a_request() {
        let body = serde_json::json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}});
        let mut buf = Vec::new();
        write_message(&mut buf, &body).await.unwrap();

        let mut reader = TokioBufReader::new(buf.as_slice());
        let decoded = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(decoded, body);
    }

    #[tokio::test]
    async fn rejects_missing_content_length() {
        let raw = b"X-Custom: value\r\n\r\n{}".to_vec();
        let mut reader = TokioBufReader::new(raw.as_slice());
        let err = read_message(&mut reader).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn rejects_non_numeric_content_length() {
        let raw = b"Content-Length: abc\r\n\r\n".to_vec();
        let mut reader = TokioBufReader::new(raw.as_slice());
        let err = read_message(&mut reader).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn clean_eof_before_any_bytes_returns_none() {
        let raw: Vec<u8> = Vec::new();
        let mut reader = TokioBufReader::new(raw.as_slice());
        assert!(read_message(&mut reader).await.unwrap().is_none());
    }
}
