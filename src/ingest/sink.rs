//! # Frame Sink
//!
//! Optional side channel that appends raw binary frames somewhere durable for
//! offline inspection (e.g. replaying a captured webm stream in a media
//! player). Strictly best-effort: a sink failure is logged by the caller and
//! the connection carries on; the sink is never on the critical path for
//! counters or acknowledgements.

use anyhow::Result;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// Capability for durably appending raw frame bytes.
///
/// Implementations must be safe to share across connection tasks.
pub trait FrameSink: Send + Sync {
    /// Append one frame's bytes. Errors are non-fatal to the caller.
    fn append(&self, chunk: &[u8]) -> Result<()>;
}

/// Appends frames to a single file on disk.
///
/// The target file is removed when the sink is created so each run starts
/// with a fresh capture; each `append` opens the file in append mode, which
/// keeps the sink trivially shareable between connections.
pub struct FileFrameSink {
    path: PathBuf,
}

impl FileFrameSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if let Err(err) = std::fs::remove_file(&path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %err, "could not reset dump file");
            }
        }
        Self { path }
    }
}

impl FrameSink for FileFrameSink {
    fn append(&self, chunk: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(chunk)?;
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    //! Test doubles for the frame sink seam.

    use super::*;
    use std::sync::Mutex;

    /// Records every appended chunk in memory.
    #[derive(Default)]
    pub struct RecordingSink {
        pub chunks: Mutex<Vec<Vec<u8>>>,
    }

    impl FrameSink for RecordingSink {
        fn append(&self, chunk: &[u8]) -> Result<()> {
            self.chunks.lock().unwrap().push(chunk.to_vec());
            Ok(())
        }
    }

    /// Fails every append, for exercising the non-fatal error path.
    pub struct FailingSink;

    impl FrameSink for FailingSink {
        fn append(&self, _chunk: &[u8]) -> Result<()> {
            anyhow::bail!("sink unavailable")
        }
    }
}
