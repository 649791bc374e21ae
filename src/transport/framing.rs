//! Line framing with the `extern ` marker.
//!
//! The add side prefixes every newline-delimited message with `extern `.
//! The del side strips one leading `extern ` or `EXTERN ` (exact spellings
//! only) and forwards everything else untouched. Both sides re-terminate the
//! message with a single `\n`.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::RelayError;

/// Marker emitted by the add side.
pub const MARKER: &[u8] = b"extern ";

/// Upper-case marker, accepted by the del side only.
pub const MARKER_UPPER: &[u8] = b"EXTERN ";

/// Default longest message accepted before a newline must appear.
pub const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// Reads newline-delimited messages, keeping buffered bytes between calls.
pub struct LineReader<R> {
    inner: BufReader<R>,
    line: Vec<u8>,
    limit: usize,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_limit(inner, MAX_MESSAGE_LEN)
    }

    pub fn with_limit(inner: R, limit: usize) -> Self {
        Self {
            inner: BufReader::new(inner),
            line: Vec::new(),
            limit,
        }
    }

    /// Next message without its terminating newline.
    ///
    /// Returns `Ok(None)` when the source ends on a message boundary. Bytes
    /// left without a newline at end of stream are an error and are dropped.
    pub async fn next_message(&mut self) -> Result<Option<&[u8]>, RelayError> {
        self.line.clear();

        loop {
            let available = self.inner.fill_buf().await.map_err(RelayError::Read)?;
            if available.is_empty() {
                if self.line.is_empty() {
                    return Ok(None);
                }
                let len = self.line.len();
                self.line.clear();
                return Err(RelayError::TruncatedMessage { len });
            }

            let newline = available.iter().position(|&b| b == b'\n');
            let take = newline.unwrap_or(available.len());
            if self.line.len() + take > self.limit {
                return Err(RelayError::MessageTooLong { limit: self.limit });
            }
            self.line.extend_from_slice(&available[..take]);

            match newline {
                Some(pos) => {
                    self.inner.consume(pos + 1);
                    return Ok(Some(&self.line));
                }
                None => self.inner.consume(take),
            }
        }
    }
}

/// Remove one leading marker, if present.
pub fn strip_marker(payload: &[u8]) -> &[u8] {
    payload
        .strip_prefix(MARKER)
        .or_else(|| payload.strip_prefix(MARKER_UPPER))
        .unwrap_or(payload)
}

fn encode_add(out: &mut Vec<u8>, payload: &[u8]) {
    out.clear();
    out.reserve(MARKER.len() + payload.len() + 1);
    out.extend_from_slice(MARKER);
    out.extend_from_slice(payload);
    out.push(b'\n');
}

fn encode_del(out: &mut Vec<u8>, payload: &[u8]) {
    let rest = strip_marker(payload);
    out.clear();
    out.reserve(rest.len() + 1);
    out.extend_from_slice(rest);
    out.push(b'\n');
}

/// Wire form of `payload` on the add side: `extern <payload>\n`.
pub fn frame_add(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    encode_add(&mut out, payload);
    out
}

/// Wire form of `payload` on the del side: marker stripped, `\n` appended.
pub fn frame_del(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    encode_del(&mut out, payload);
    out
}

/// Forward messages from `src` to `dst`, adding the marker.
pub async fn copy_add<R, W>(dst: &mut W, src: R) -> Result<(), RelayError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + ?Sized,
{
    copy_add_with_limit(dst, src, MAX_MESSAGE_LEN).await
}

/// [`copy_add`] with an explicit line length limit.
pub async fn copy_add_with_limit<R, W>(dst: &mut W, src: R, limit: usize) -> Result<(), RelayError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + ?Sized,
{
    copy_framed(dst, LineReader::with_limit(src, limit), encode_add, "add").await
}

/// Forward messages from `src` to `dst`, stripping the marker.
pub async fn copy_del<R, W>(dst: &mut W, src: R) -> Result<(), RelayError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + ?Sized,
{
    copy_del_with_limit(dst, src, MAX_MESSAGE_LEN).await
}

/// [`copy_del`] with an explicit line length limit.
pub async fn copy_del_with_limit<R, W>(dst: &mut W, src: R, limit: usize) -> Result<(), RelayError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + ?Sized,
{
    copy_framed(dst, LineReader::with_limit(src, limit), encode_del, "del").await
}

async fn copy_framed<R, W>(
    dst: &mut W,
    mut reader: LineReader<R>,
    encode: fn(&mut Vec<u8>, &[u8]),
    side: &'static str,
) -> Result<(), RelayError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut out = Vec::new();

    while let Some(message) = reader.next_message().await? {
        encode(&mut out, message);
        tracing::trace!(side, bytes = out.len(), "Message forwarded");
        dst.write_all(&out).await.map_err(RelayError::Write)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn strip_marker_spellings() {
        assert_eq!(strip_marker(b"extern hello"), b"hello");
        assert_eq!(strip_marker(b"EXTERN hello"), b"hello");
        assert_eq!(strip_marker(b"Extern hello"), b"Extern hello");
        assert_eq!(strip_marker(b"externhello"), b"externhello");
        assert_eq!(strip_marker(b"extern extern hello"), b"extern hello");
    }

    #[test]
    fn marker_only_strips_to_empty_line() {
        assert_eq!(frame_del(b"extern "), b"\n");
        assert_eq!(frame_del(b"EXTERN "), b"\n");
    }

    #[test]
    fn del_without_marker_only_appends_newline() {
        for payload in [&b"hello"[..], b"", b"ext", b"  extern x"] {
            let mut expected = payload.to_vec();
            expected.push(b'\n');
            assert_eq!(frame_del(payload), expected);
        }
    }

    #[test]
    fn add_then_del_restores_message() {
        for payload in [&b"hello"[..], b"", b"hello world", b"EXTERNAL", b"\r"] {
            let framed = frame_add(payload);
            assert!(framed.starts_with(MARKER));
            let wire_payload = &framed[..framed.len() - 1];
            let mut expected = payload.to_vec();
            expected.push(b'\n');
            assert_eq!(frame_del(wire_payload), expected);
        }
    }

    #[tokio::test]
    async fn line_reader_keeps_state_between_messages() {
        let mut reader = LineReader::new(&b"one\ntwo\n\nthree\n"[..]);
        assert_eq!(reader.next_message().await.unwrap(), Some(&b"one"[..]));
        assert_eq!(reader.next_message().await.unwrap(), Some(&b"two"[..]));
        assert_eq!(reader.next_message().await.unwrap(), Some(&b""[..]));
        assert_eq!(reader.next_message().await.unwrap(), Some(&b"three"[..]));
        assert_eq!(reader.next_message().await.unwrap(), None);
    }

    #[tokio::test]
    async fn line_reader_reassembles_split_writes() {
        let (mut tx, rx) = tokio::io::duplex(4);
        let writer = tokio::spawn(async move {
            tx.write_all(b"a fairly long message\n").await.unwrap();
        });

        let mut reader = LineReader::new(rx);
        assert_eq!(
            reader.next_message().await.unwrap(),
            Some(&b"a fairly long message"[..])
        );
        writer.await.unwrap();
        assert_eq!(reader.next_message().await.unwrap(), None);
    }

    #[tokio::test]
    async fn line_reader_rejects_truncated_message() {
        let mut reader = LineReader::new(&b"done\npartial"[..]);
        assert_eq!(reader.next_message().await.unwrap(), Some(&b"done"[..]));
        assert!(matches!(
            reader.next_message().await,
            Err(RelayError::TruncatedMessage { len: 7 })
        ));
    }

    #[tokio::test]
    async fn line_reader_enforces_limit() {
        let mut reader = LineReader::with_limit(&b"0123456789\n"[..], 4);
        assert!(matches!(
            reader.next_message().await,
            Err(RelayError::MessageTooLong { limit: 4 })
        ));
    }

    #[tokio::test]
    async fn copy_add_prefixes_every_message() {
        let mut out = Vec::new();
        copy_add(&mut out, &b"hello\nworld\n"[..]).await.unwrap();
        assert_eq!(out, b"extern hello\nextern world\n");
    }

    #[tokio::test]
    async fn copy_del_strips_accepted_spellings() {
        let input = b"extern hello\nEXTERN loud\nExtern mixed\nplain\nextern \n";
        let mut out = Vec::new();
        copy_del(&mut out, &input[..]).await.unwrap();
        assert_eq!(out, b"hello\nloud\nExtern mixed\nplain\n\n");
    }

    #[tokio::test]
    async fn copy_add_drops_partial_message() {
        let mut out = Vec::new();
        let err = copy_add(&mut out, &b"hello\nwor"[..]).await.unwrap_err();
        assert!(matches!(err, RelayError::TruncatedMessage { len: 3 }));
        assert_eq!(out, b"extern hello\n");
    }

    #[tokio::test]
    async fn copy_del_honours_custom_limit() {
        let mut out = Vec::new();
        copy_del_with_limit(&mut out, &b"extern ok\n"[..], 9).await.unwrap();
        assert_eq!(out, b"ok\n");

        let err = copy_del_with_limit(&mut out, &b"extern too long\n"[..], 9)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::MessageTooLong { limit: 9 }));
    }

    #[tokio::test]
    async fn copy_reports_write_failure() {
        let (mut dst, peer) = tokio::io::duplex(64);
        drop(peer);
        let err = copy_del(&mut dst, &b"hello\n"[..]).await.unwrap_err();
        assert!(matches!(err, RelayError::Write(_)));
    }

    #[tokio::test]
    async fn hello_crosses_add_then_del() {
        let mut wire = Vec::new();
        copy_add(&mut wire, &b"hello\n"[..]).await.unwrap();
        assert_eq!(wire, b"extern hello\n");

        let (mut tx, mut rx) = tokio::io::duplex(64);
        copy_del(&mut tx, &wire[..]).await.unwrap();
        drop(tx);
        let mut delivered = Vec::new();
        rx.read_to_end(&mut delivered).await.unwrap();
        assert_eq!(delivered, b"hello\n");
    }
}
