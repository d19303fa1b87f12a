use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::response::StatusCode;

const HTTP_VERSION: &str = "HTTP/1.1";

/// Serializes a status line and header block, blank line included.
pub(crate) fn serialize_head(status: StatusCode, headers: &[(String, String)], buf: &mut BytesMut) {
    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        status.as_u16(),
        status.reason_phrase()
    );
    buf.put_slice(status_line.as_bytes());

    for (k, v) in headers {
        buf.put_slice(k.as_bytes());
        buf.put_slice(b": ");
        buf.put_slice(v.as_bytes());
        buf.put_slice(b"\r\n");
    }

    buf.put_slice(b"\r\n");
}

/// Flushes one serialized response, resuming after partial writes.
///
/// The transport may accept fewer bytes than offered, or none until it
/// becomes writable again; progress is kept in `written` so a write can be
/// resumed without resending anything.
pub struct ResponseWriter {
    buffer: Bytes,
    written: usize,
}

impl ResponseWriter {
    pub fn new(buffer: Bytes) -> Self {
        Self { buffer, written: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.written
    }

    pub fn is_done(&self) -> bool {
        self.remaining() == 0
    }

    pub async fn write_to_stream<W>(&mut self, stream: &mut W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        while self.written < self.buffer.len() {
            let n = stream.write(&self.buffer[self.written..]).await?;

            if n == 0 {
                return Err(std::io::ErrorKind::WriteZero.into());
            }

            self.written += n;
        }

        stream.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_keeps_header_order() {
        let mut buf = BytesMut::new();
        let headers = vec![
            ("x-b".to_string(), "2".to_string()),
            ("x-a".to_string(), "1".to_string()),
        ];
        serialize_head(StatusCode::NOT_FOUND, &headers, &mut buf);
        assert_eq!(&buf[..], b"HTTP/1.1 404 Not Found\r\nx-b: 2\r\nx-a: 1\r\n\r\n");
    }

    #[tokio::test]
    async fn writes_through_a_narrow_pipe() {
        let payload = Bytes::from(vec![b'z'; 64 * 1024]);
        let (mut client, mut server) = tokio::io::duplex(7);

        let reader = tokio::spawn(async move {
            let mut out = Vec::new();
            tokio::io::AsyncReadExt::read_to_end(&mut client, &mut out)
                .await
                .unwrap();
            out
        });

        let mut writer = ResponseWriter::new(payload.clone());
        writer.write_to_stream(&mut server).await.unwrap();
        assert!(writer.is_done());
        drop(server);

        assert_eq!(reader.await.unwrap(), payload.to_vec());
    }
}
