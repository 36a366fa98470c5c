//! Line-delimited transport over a reader/writer pair, stdin/stdout in
//! production. One request per line in, one response per line out.

use async_trait::async_trait;
use tokio::io::{
    self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout,
};

use crate::errors::TransportError;
use crate::transport::{Connection, Listener};

pub const STDIO_URL: &str = "stdio://";

pub struct LineConnection<R, W> {
    reader: R,
    writer: W,
    buf: Vec<u8>,
}

impl<R, W> LineConnection<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            buf: Vec::new(),
        }
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<R, W> Connection for LineConnection<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Invalid UTF-8 is decoded lossily so the frame still reaches the
    /// server and gets a parse error back.
    async fn receive(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            self.buf.clear();
            if self.reader.read_until(b'\n', &mut self.buf).await? == 0 {
                return Ok(None);
            }

            let line = String::from_utf8_lossy(trim_line_ending(&self.buf));
            if !line.trim().is_empty() {
                return Ok(Some(line.into_owned()));
            }
        }
    }

    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        self.writer.write_all(frame.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.writer.flush().await?;
        Ok(())
    }
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

pub type StdioConnection = LineConnection<BufReader<Stdin>, Stdout>;

/// Hands out the process's stdin/stdout pair exactly once.
#[derive(Debug, Default)]
pub struct StdioListener {
    accepted: bool,
}

impl StdioListener {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Listener for StdioListener {
    type Conn = StdioConnection;

    fn url(&self) -> String {
        STDIO_URL.to_string()
    }

    async fn accept(&mut self) -> Result<Option<Self::Conn>, TransportError> {
        if self.accepted {
            return Ok(None);
        }
        self.accepted = true;
        Ok(Some(LineConnection::new(
            BufReader::new(io::stdin()),
            io::stdout(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::catalog::ModuleCatalog;
    use crate::rpc::server::RpcServer;
    use crate::transport::serve_connection;

    #[tokio::test]
    async fn one_response_line_per_request_line() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"upper","params":["abc"]}"#,
            "\n\n",
            "oops\n",
            r#"{"jsonrpc":"2.0","id":"last","method":"concat","params":["a","b"]}"#,
            "\n",
        );
        let server = RpcServer::new(ModuleCatalog::default().load("text").expect("text loads"));
        let mut connection = LineConnection::new(input.as_bytes(), Vec::new());

        serve_connection(&server, &mut connection)
            .await
            .expect("connection served");

        let output = String::from_utf8(connection.into_writer()).expect("utf-8 output");
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], r#"{"jsonrpc":"2.0","id":1,"result":"ABC"}"#);
        let parse_error: Value = serde_json::from_str(lines[1]).expect("valid json line");
        assert_eq!(parse_error["error"]["code"], -32700);
        assert_eq!(lines[2], r#"{"jsonrpc":"2.0","id":"last","result":"ab"}"#);
    }

    #[tokio::test]
    async fn invalid_utf8_line_gets_parse_error_and_serving_continues() {
        let mut input = b"\xff\xfe garbage\r\n".to_vec();
        input.extend_from_slice(
            br#"{"jsonrpc":"2.0","id":7,"method":"upper","params":["ok"]}"#,
        );
        let server = RpcServer::new(ModuleCatalog::default().load("text").expect("text loads"));
        let mut connection = LineConnection::new(input.as_slice(), Vec::new());

        serve_connection(&server, &mut connection)
            .await
            .expect("connection served");

        let output = String::from_utf8(connection.into_writer()).expect("utf-8 output");
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        let parse_error: Value = serde_json::from_str(lines[0]).expect("valid json line");
        assert_eq!(parse_error["error"]["code"], -32700);
        assert_eq!(parse_error["id"], Value::Null);
        assert_eq!(lines[1], r#"{"jsonrpc":"2.0","id":7,"result":"OK"}"#);
    }

    #[tokio::test]
    async fn listener_hands_out_a_single_connection() {
        let mut listener = StdioListener::new();
        assert_eq!(listener.url(), STDIO_URL);
        assert!(listener.accept().await.expect("accept").is_some());
        assert!(listener.accept().await.expect("accept").is_none());
    }
}
