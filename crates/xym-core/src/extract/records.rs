//! Length-prefixed record streams.
//!
//! Each record is a `u32` little-endian byte length followed by a bincode
//! body. Streams are written incrementally so a reader can pick up a
//! partially written file and skip a known-good prefix.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::block::{Block, BlockSummary};
use crate::error::CoreError;
use crate::statement::StatementGroup;

// ==============================================================================
// Sink Trait
// ==============================================================================

/// Destination for the records produced while merging blocks and
/// statements.
pub trait RecordSink {
    fn write_block(&mut self, block: &Block) -> Result<(), CoreError>;
    fn write_statements(&mut self, group: &StatementGroup) -> Result<(), CoreError>;
}

// ==============================================================================
// Writer / Reader
// ==============================================================================

pub struct RecordWriter<W: Write> {
    inner: W,
    written: u64,
}

impl RecordWriter<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self, CoreError> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    pub fn write_record<T: Serialize>(&mut self, record: &T) -> Result<(), CoreError> {
        let body = bincode::serialize(record).map_err(|e| CoreError::Record(e.to_string()))?;
        let len = u32::try_from(body.len())
            .map_err(|_| CoreError::Record(format!("record of {} bytes too large", body.len())))?;
        self.inner.write_all(&len.to_le_bytes())?;
        self.inner.write_all(&body)?;
        self.written += 1;
        Ok(())
    }

    /// Records written through this writer.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) -> Result<(), CoreError> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

pub struct RecordReader<R: Read> {
    inner: R,
}

impl RecordReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, CoreError> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: Read> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Read the next record body. `Ok(None)` at a clean end of stream; a
    /// stream cut inside a length prefix or a record is an error.
    fn next_body(&mut self) -> Result<Option<Vec<u8>>, CoreError> {
        let mut prefix = [0u8; 4];
        let mut filled = 0;
        while filled < prefix.len() {
            match self.inner.read(&mut prefix[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        match filled {
            0 => return Ok(None),
            4 => {}
            n => {
                return Err(CoreError::Record(format!(
                    "truncated length prefix: {n} of 4 bytes"
                )))
            }
        }

        // The prefix may be corrupt; never allocate from it directly.
        let len = u64::from(u32::from_le_bytes(prefix));
        let mut body = Vec::new();
        self.inner.by_ref().take(len).read_to_end(&mut body)?;
        if body.len() as u64 != len {
            return Err(CoreError::Record(format!(
                "truncated record: expected {len} bytes, found {}",
                body.len()
            )));
        }
        Ok(Some(body))
    }

    pub fn next_record<T: DeserializeOwned>(&mut self) -> Result<Option<T>, CoreError> {
        self.next_body()?
            .map(|body| bincode::deserialize(&body).map_err(|e| CoreError::Record(e.to_string())))
            .transpose()
    }

    /// Skip up to `count` records without decoding them. Returns the number
    /// actually skipped.
    pub fn skip(&mut self, count: usize) -> Result<usize, CoreError> {
        for skipped in 0..count {
            if self.next_body()?.is_none() {
                return Ok(skipped);
            }
        }
        Ok(count)
    }
}

// ==============================================================================
// File Sink
// ==============================================================================

/// Writes block and statement records to their files and, optionally, one
/// JSON [`BlockSummary`] per line.
pub struct FileSink {
    blocks: RecordWriter<BufWriter<File>>,
    statements: RecordWriter<BufWriter<File>>,
    summaries: Option<BufWriter<File>>,
}

impl FileSink {
    pub fn create(
        block_data: &Path,
        statement_data: &Path,
        block_summaries: Option<&Path>,
    ) -> Result<Self, CoreError> {
        let summaries = block_summaries
            .map(|path| File::create(path).map(BufWriter::new))
            .transpose()?;
        Ok(Self {
            blocks: RecordWriter::create(block_data)?,
            statements: RecordWriter::create(statement_data)?,
            summaries,
        })
    }

    /// Flush all files. Returns `(block records, statement records)`.
    pub fn finish(mut self) -> Result<(u64, u64), CoreError> {
        self.blocks.flush()?;
        self.statements.flush()?;
        if let Some(summaries) = self.summaries.as_mut() {
            summaries.flush()?;
        }
        Ok((self.blocks.written(), self.statements.written()))
    }
}

impl RecordSink for FileSink {
    fn write_block(&mut self, block: &Block) -> Result<(), CoreError> {
        self.blocks.write_record(block)?;
        if let Some(summaries) = self.summaries.as_mut() {
            let line = serde_json::to_string(&BlockSummary::from(block))
                .map_err(|e| CoreError::Record(e.to_string()))?;
            writeln!(summaries, "{line}")?;
        }
        Ok(())
    }

    fn write_statements(&mut self, group: &StatementGroup) -> Result<(), CoreError> {
        self.statements.write_record(group)
    }
}

// ==============================================================================
// Memory Sink
// ==============================================================================

/// Keeps the heights of everything written, in order. Useful when only the
/// accumulated state matters or for inspecting merge order.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub block_heights: Vec<u64>,
    pub statement_heights: Vec<u64>,
}

impl RecordSink for MemorySink {
    fn write_block(&mut self, block: &Block) -> Result<(), CoreError> {
        self.block_heights.push(block.height());
        Ok(())
    }

    fn write_statements(&mut self, group: &StatementGroup) -> Result<(), CoreError> {
        self.statement_heights.push(group.height);
        Ok(())
    }
}
