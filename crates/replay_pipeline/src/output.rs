//! Output files of a replay session.
//!
//! The observation stream is a sequence of length-prefixed records: a `u32`
//! little-endian byte count followed by a bincode-encoded [`FrameRecord`].
//! Streams are written to a `.partial` sibling and renamed into place when
//! finished, so a stream at its final path is always complete.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use replay_core::encoder::FeatureTensors;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::layout::ParticipantOutputs;

/// One captured frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Sampled frame index.
    pub frame: u32,
    /// Game loop the engine reported for the capture.
    pub game_loop: u32,
    /// Encoded observation.
    pub features: FeatureTensors,
}

/// Static per-match metadata captured when a session starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalInfo {
    /// Engine game info dump.
    pub game_info: String,
    /// Engine static data dump.
    pub data_raw: String,
}

impl GlobalInfo {
    /// Write as JSON, atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec(self).map_err(|e| PipelineError::json(path, e))?;
        write_atomic(path, &json)
    }

    /// Read a JSON global-info file.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| PipelineError::io(path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| PipelineError::json(path, e))
    }
}

/// Temporary sibling a file is written to before being renamed into place.
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

/// Write `bytes` to `path` via a temporary sibling.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = partial_path(path);
    fs::write(&tmp, bytes).map_err(|e| PipelineError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| PipelineError::io(path, e))
}

/// Buffered writer of an observation stream.
#[derive(Debug)]
pub struct RecordWriter {
    writer: BufWriter<File>,
    partial: PathBuf,
    target: PathBuf,
    records: usize,
}

impl RecordWriter {
    /// Start a stream that will land at `target` once finished.
    pub fn create(target: &Path) -> Result<Self> {
        let partial = partial_path(target);
        let file = File::create(&partial).map_err(|e| PipelineError::io(&partial, e))?;
        Ok(Self {
            writer: BufWriter::new(file),
            partial,
            target: target.to_path_buf(),
            records: 0,
        })
    }

    /// Append one record.
    pub fn append(&mut self, record: &FrameRecord) -> Result<()> {
        let payload = bincode::serialize(record)?;
        let len = u32::try_from(payload.len()).map_err(|_| {
            PipelineError::io(
                &self.partial,
                io::Error::new(io::ErrorKind::InvalidData, "record exceeds 4 GiB"),
            )
        })?;
        self.writer
            .write_all(&len.to_le_bytes())
            .and_then(|()| self.writer.write_all(&payload))
            .map_err(|e| PipelineError::io(&self.partial, e))?;
        self.records += 1;
        Ok(())
    }

    /// Records appended so far.
    pub fn records(&self) -> usize {
        self.records
    }

    /// Flush everything and move the stream to its final path.
    pub fn finish(self) -> Result<PathBuf> {
        let Self {
            writer,
            partial,
            target,
            ..
        } = self;
        let file = writer
            .into_inner()
            .map_err(|e| PipelineError::io(&partial, e.into_error()))?;
        file.sync_all().map_err(|e| PipelineError::io(&partial, e))?;
        drop(file);
        fs::rename(&partial, &target).map_err(|e| PipelineError::io(&target, e))?;
        Ok(target)
    }
}

/// Sequential reader of an observation stream.
#[derive(Debug)]
pub struct RecordReader<R> {
    reader: R,
}

impl RecordReader<BufReader<File>> {
    /// Open a stream file.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> RecordReader<R> {
    /// Read records from any byte source.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Next record, or `None` at a clean end of stream.
    pub fn next_record(&mut self) -> Result<Option<FrameRecord>> {
        let mut len = [0u8; 4];
        match self.reader.read_exact(&mut len) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(PipelineError::io("<record stream>", e)),
        }
        let mut payload = vec![0u8; u32::from_le_bytes(len) as usize];
        self.reader
            .read_exact(&mut payload)
            .map_err(|e| PipelineError::io("<record stream>", e))?;
        Ok(Some(bincode::deserialize(&payload)?))
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<FrameRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// Read a whole stream file.
pub fn read_records(path: &Path) -> Result<Vec<FrameRecord>> {
    RecordReader::open(path)?.collect()
}

/// Owns the outputs of one (match, participant) until committed.
///
/// Dropping an uncommitted guard removes the stream (final and partial) and
/// the global-info file.
#[derive(Debug)]
pub struct OutputGuard {
    outputs: ParticipantOutputs,
    committed: bool,
}

impl OutputGuard {
    /// Take ownership of `outputs`.
    pub fn new(outputs: ParticipantOutputs) -> Self {
        Self {
            outputs,
            committed: false,
        }
    }

    /// Paths being guarded.
    pub fn outputs(&self) -> &ParticipantOutputs {
        &self.outputs
    }

    /// Keep the outputs.
    pub fn commit(mut self) {
        self.committed = true;
    }

    fn remove(path: &Path) {
        match fs::remove_file(path) {
            Ok(()) => tracing::debug!(path = %path.display(), "Removed partial output"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial output"),
        }
    }
}

impl Drop for OutputGuard {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        Self::remove(&partial_path(&self.outputs.observations));
        Self::remove(&self.outputs.observations);
        Self::remove(&partial_path(&self.outputs.global_info));
        Self::remove(&self.outputs.global_info);
    }
}
