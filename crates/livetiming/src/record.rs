//! Newline-delimited JSON persistence of the stream.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::Serialize;
use tracing::warn;

use crate::session::{FrameRecord, FrameSink};

#[derive(Serialize)]
struct SnapshotLine<'a> {
    source: &'static str,
    snapshot_id: u16,
    len: usize,
    file: &'a str,
}

/// Writes one JSON object per frame to a record file.
///
/// Raw snapshot blobs are written next to the record file as
/// `keyframe_{id:05}.bin` and referenced by a `snapshot_blob` line. Write
/// failures are logged and counted; they never stop the stream.
pub struct JsonlSink<W: Write + Send> {
    out: W,
    blob_dir: Option<PathBuf>,
    lines: u64,
    failures: u64,
}

impl JsonlSink<BufWriter<File>> {
    /// Create (or truncate) `path`; blobs go to the same directory.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let out = BufWriter::new(File::create(path)?);
        let blob_dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Ok(Self {
            out,
            blob_dir: Some(blob_dir),
            lines: 0,
            failures: 0,
        })
    }
}

impl<W: Write + Send> JsonlSink<W> {
    /// Sink over any writer; snapshot blobs are only referenced, not written.
    pub fn new(out: W) -> Self {
        Self {
            out,
            blob_dir: None,
            lines: 0,
            failures: 0,
        }
    }

    /// Lines written so far.
    pub fn lines(&self) -> u64 {
        self.lines
    }

    /// Writes that failed so far.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line<T: Serialize>(&mut self, value: &T) {
        let result = serde_json::to_writer(&mut self.out, value)
            .map_err(io::Error::from)
            .and_then(|()| self.out.write_all(b"\n"))
            .and_then(|()| self.out.flush());
        match result {
            Ok(()) => self.lines += 1,
            Err(err) => {
                self.failures += 1;
                warn!(error = %err, "failed to write record");
            }
        }
    }
}

impl<W: Write + Send> FrameSink for JsonlSink<W> {
    fn save_frame(&mut self, record: &FrameRecord) {
        self.write_line(record);
    }

    fn save_snapshot(&mut self, snapshot_id: u16, blob: &Bytes) {
        let name = format!("keyframe_{snapshot_id:05}.bin");
        if let Some(dir) = &self.blob_dir {
            if let Err(err) = fs::write(dir.join(&name), blob) {
                self.failures += 1;
                warn!(snapshot_id, error = %err, "failed to store snapshot blob");
            }
        }
        self.write_line(&SnapshotLine {
            source: "snapshot_blob",
            snapshot_id,
            len: blob.len(),
            file: &name,
        });
    }
}
