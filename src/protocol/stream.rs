use crate::protocol::SessionMessage;
use crate::utils::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

/// A lazy sequence of parsed session messages read from a streaming body.
///
/// Framing is line-oriented: each message is one line terminated by LF or
/// CRLF. Blank lines are skipped. A line that fails to parse is yielded as
/// an `Err` item so the consumer can log it and keep reading; the sequence
/// ends when the underlying reader reaches EOF.
pub struct MessageStream<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin> MessageStream<R> {
    /// Wraps a buffered reader in a message stream.
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }

    /// Returns the next message, a parse error for a malformed line, or
    /// `None` at EOF.
    pub async fn next(&mut self) -> Option<Result<SessionMessage, Error>> {
        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) if line.is_empty() => continue,
                Ok(Some(line)) => return Some(SessionMessage::parse(&line)),
                Ok(None) => return None,
                Err(e) => return Some(Err(Error::Read(e))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(input: &str) -> Vec<Result<SessionMessage, Error>> {
        let mut stream = MessageStream::new(input.as_bytes());
        let mut messages = Vec::new();
        while let Some(message) = stream.next().await {
            messages.push(message);
        }
        messages
    }

    #[tokio::test]
    async fn test_single_message() {
        let got = collect("PROBE\r\n").await;
        assert_eq!(got.len(), 1);
        assert_eq!(*got[0].as_ref().unwrap(), SessionMessage::Probe);
    }

    #[tokio::test]
    async fn test_multiple_messages_mixed_endings() {
        let got = collect("CONOK,sessionID,500,5000,*\r\nPROBE\nEND,1,ok\r\n").await;
        let kinds: Vec<_> = got
            .into_iter()
            .map(|m| m.unwrap().to_string())
            .collect();
        assert_eq!(
            kinds,
            vec!["CONOK,sessionID,500,5000,*", "PROBE", "END,1,ok"]
        );
    }

    #[tokio::test]
    async fn test_invalid_line_is_yielded_as_error() {
        let got = collect("CONOK,sessionID,500,5000,*\r\nSYNC,a\r\nEND,1,ok\r\n").await;
        assert_eq!(got.len(), 3);
        assert!(got[0].is_ok());
        assert!(got[1].is_err());
        assert!(got[2].is_ok());
    }

    #[tokio::test]
    async fn test_blank_lines_skipped() {
        let got = collect("\r\nPROBE\r\n\r\n").await;
        assert_eq!(got.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_input_ends_immediately() {
        assert!(collect("").await.is_empty());
    }

    #[tokio::test]
    async fn test_last_line_without_newline() {
        let got = collect("PROBE").await;
        assert_eq!(got.len(), 1);
        assert_eq!(*got[0].as_ref().unwrap(), SessionMessage::Probe);
    }
}
