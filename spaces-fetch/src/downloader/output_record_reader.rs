//! Record reader for piped fetch-tool output.
//!
//! yt-dlp redraws its `[download]` progress line with carriage returns, so a
//! plain line reader would only surface it once the download finishes. This
//! reader yields records delimited by either `\n` or `\r`.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, BufReader};

/// Longest record kept before it is emitted without a delimiter.
const MAX_RECORD_LEN: usize = 64 * 1024;

fn is_delimiter(b: u8) -> bool {
    matches!(b, b'\n' | b'\r')
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

/// Async reader yielding trimmed, non-empty text records.
pub struct OutputRecordReader<R> {
    reader: BufReader<R>,
    pending: Vec<u8>,
    chunk: [u8; 4096],
    eof: bool,
}

impl<R> OutputRecordReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            pending: Vec::new(),
            chunk: [0u8; 4096],
            eof: false,
        }
    }

    /// Next record, or `None` at end of stream. Blank records are skipped.
    pub async fn next_record(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(record) = self.take_buffered() {
                if record.is_empty() {
                    continue;
                }
                return Ok(Some(record));
            }

            if self.eof {
                let rest = decode(&self.pending);
                self.pending.clear();
                return Ok((!rest.is_empty()).then_some(rest));
            }

            let n = self.reader.read(&mut self.chunk).await?;
            if n == 0 {
                self.eof = true;
            } else {
                self.pending.extend_from_slice(&self.chunk[..n]);
            }
        }
    }

    /// Split off one buffered record if a delimiter (or the length cap) is reached.
    fn take_buffered(&mut self) -> Option<String> {
        let end = match self.pending.iter().position(|&b| is_delimiter(b)) {
            Some(idx) => idx,
            None if self.pending.len() >= MAX_RECORD_LEN => MAX_RECORD_LEN,
            None => return None,
        };

        let record = decode(&self.pending[..end]);
        let skip = self.pending[end..]
            .iter()
            .take_while(|&&b| is_delimiter(b))
            .count();
        self.pending.drain(..end + skip);
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    async fn collect(input: &'static [u8]) -> Vec<String> {
        let (mut tx, rx) = tokio::io::duplex(1024);
        tokio::spawn(async move {
            let _ = tx.write_all(input).await;
        });

        let mut reader = OutputRecordReader::new(rx);
        let mut records = Vec::new();
        while let Some(record) = reader.next_record().await.unwrap() {
            records.push(record);
        }
        records
    }

    #[tokio::test]
    async fn splits_progress_redraws() {
        let records = collect(
            b"[download]   1.0% of 50.00MiB\r[download]  50.0% of 50.00MiB\r[download] 100% of 50.00MiB\n",
        )
        .await;
        assert_eq!(
            records,
            vec![
                "[download]   1.0% of 50.00MiB",
                "[download]  50.0% of 50.00MiB",
                "[download] 100% of 50.00MiB",
            ]
        );
    }

    #[tokio::test]
    async fn keeps_trailing_record_and_skips_blank_ones() {
        let records = collect(b"\r\n\nERROR: first\r\n  \nlast without newline").await;
        assert_eq!(records, vec!["ERROR: first", "last without newline"]);
    }

    #[tokio::test]
    async fn empty_stream_yields_nothing() {
        assert!(collect(b"").await.is_empty());
    }
}
