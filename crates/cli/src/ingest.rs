//! Line-oriented ingestion loop.

use docmerge_core::{Document, DocumentProcessor};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Counts for one ingestion run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub merged: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Errors that end an ingestion run early.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to read input: {0}")]
    Read(std::io::Error),

    #[error("failed to write output: {0}")]
    Write(std::io::Error),

    #[error("failed to encode merged document: {0}")]
    Encode(serde_json::Error),
}

/// Feed every input line through `processor` and write merged documents.
///
/// Blank lines are skipped. Lines that do not decode and documents the
/// processor rejects are logged and counted; only I/O failures end the run.
pub async fn run<R, W>(processor: &DocumentProcessor, reader: R, mut writer: W) -> Result<Summary, IngestError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut summary = Summary::default();
    let mut lines = reader.lines();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await.map_err(IngestError::Read)? {
        line_no += 1;
        if line.trim().is_empty() {
            summary.skipped += 1;
            continue;
        }

        let doc: Document = match serde_json::from_str(&line) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(line = line_no, error = %e, "skipping undecodable line");
                summary.skipped += 1;
                continue;
            }
        };

        match processor.process(doc).await {
            Ok(merged) => {
                let mut out = serde_json::to_vec(&merged).map_err(IngestError::Encode)?;
                out.push(b'\n');
                writer.write_all(&out).await.map_err(IngestError::Write)?;
                summary.merged += 1;
            }
            Err(e) => {
                tracing::warn!(line = line_no, error = %e, "failed to merge document");
                summary.failed += 1;
            }
        }
    }

    writer.flush().await.map_err(IngestError::Write)?;
    Ok(summary)
}
