//! Minimal HTTP/1.1 framing for the HTTP carriers.
//!
//! Both peers are this toolkit, so only the subset they emit is parsed.
//! Requests use Content-Length framing; chunked encoding is not
//! supported.

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::error::{Error, Result};

/// Largest request body either carrier will buffer.
const MAX_BODY: usize = 1 << 20;

/// A parsed inbound request.
pub(crate) struct HttpRequest {
    /// Request method (GET, POST, ...)
    pub method: String,
    /// Header name/value pairs in arrival order
    pub headers: Vec<(String, String)>,
    /// Request body
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Read one request, or `None` on clean end-of-stream.
pub(crate) async fn read_request(
    reader: &mut BufReader<OwnedReadHalf>,
) -> Result<Option<HttpRequest>> {
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    let mut parts = line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| Error::invalid("empty request line"))?
        .to_string();
    let _target = parts
        .next()
        .ok_or_else(|| Error::invalid("request line missing target"))?;

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Err(Error::invalid("connection closed mid-headers"));
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::invalid(format!("malformed header line: {}", line)))?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    let length: usize = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .map(|(_, v)| v.parse())
        .transpose()
        .map_err(|_| Error::invalid("unparseable Content-Length"))?
        .unwrap_or(0);
    if length > MAX_BODY {
        return Err(Error::invalid(format!(
            "request body of {} bytes exceeds cap",
            length
        )));
    }

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;

    Ok(Some(HttpRequest {
        method,
        headers,
        body,
    }))
}

/// Write one request with Content-Length framing.
pub(crate) async fn write_request(
    writer: &mut OwnedWriteHalf,
    method: &str,
    target: &str,
    host: &str,
    extra_headers: &[(&str, String)],
    body: &[u8],
) -> Result<()> {
    let mut head = format!(
        "{} {} HTTP/1.1\r\nHost: {}\r\nContent-Length: {}\r\n",
        method,
        target,
        host,
        body.len()
    );
    for (name, value) in extra_headers {
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    head.push_str("\r\n");

    writer.write_all(head.as_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one response and return its status code, discarding any body.
pub(crate) async fn read_response(reader: &mut BufReader<OwnedReadHalf>) -> Result<u16> {
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Err(Error::invalid("connection closed before response"));
    }
    let status = line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::invalid(format!("malformed status line: {}", line.trim_end())))?;

    let mut length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Err(Error::invalid("connection closed mid-headers"));
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                length = value
                    .trim()
                    .parse()
                    .map_err(|_| Error::invalid("unparseable Content-Length"))?;
            }
        }
    }
    if length > 0 {
        let mut discard = vec![0u8; length.min(MAX_BODY)];
        reader.read_exact(&mut discard).await?;
    }
    Ok(status)
}

/// Write a bare 204.
pub(crate) async fn write_no_content(writer: &mut OwnedWriteHalf) -> Result<()> {
    writer
        .write_all(b"HTTP/1.1 204 No Content\r\nContent-Length: 0\r\n\r\n")
        .await?;
    writer.flush().await?;
    Ok(())
}

/// Lowercase hex rendering for request identifiers.
pub(crate) fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::{TcpListener, TcpStream};

    #[tokio::test]
    async fn test_request_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let stream = TcpStream::connect(addr).await.unwrap();
            let (_read, mut write) = stream.into_split();
            write_request(
                &mut write,
                "POST",
                "/sync",
                "127.0.0.1",
                &[("X-Request-Id", "00ff".to_string())],
                b"hello body",
            )
            .await
            .unwrap();
        });

        let (stream, _) = listener.accept().await.unwrap();
        let (read, _write) = stream.into_split();
        let mut reader = BufReader::new(read);
        let request = read_request(&mut reader).await.unwrap().unwrap();

        assert_eq!(request.method, "POST");
        assert_eq!(request.header("x-request-id"), Some("00ff"));
        assert_eq!(request.body, b"hello body");
        client.await.unwrap();
    }

    #[tokio::test]
    async fn test_response_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (_read, mut write) = stream.into_split();
            write_no_content(&mut write).await.unwrap();
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let (read, _write) = stream.into_split();
        let mut reader = BufReader::new(read);
        assert_eq!(read_response(&mut reader).await.unwrap(), 204);
        server.await.unwrap();
    }

    #[test]
    fn test_to_hex() {
        assert_eq!(to_hex(&[0x00, 0xAB, 0xFF]), "00abff");
    }
}
