//! Sinks that capture subprocess stdout and replay it later.
//!
//! A recorder collects everything the child process writes, remembers
//! how many bytes it saw (which becomes the `Content-Length` of the
//! response), and can replay the full capture into any writer. The
//! in-memory variant backs small textual responses; the temp-file
//! variant spills large or binary payloads to disk.

use std::fs;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use super::new_temp_file;

/// Captured subprocess output with a known length and replay support.
///
/// After `close` the recorder releases its storage and no further
/// operation is valid.
pub trait ResultRecorder: Write + Send {
    /// Number of bytes recorded so far.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replay the full recorded content into `output`, rewinding first.
    fn write_to(&mut self, output: &mut dyn Write) -> io::Result<u64>;

    /// Release the backing storage.
    fn close(&mut self) -> io::Result<()>;
}

/// Recorder backed by an expandable in-memory buffer.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    buffer: Vec<u8>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Write for MemoryRecorder {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ResultRecorder for MemoryRecorder {
    fn len(&self) -> usize {
        self.buffer.len()
    }

    fn write_to(&mut self, output: &mut dyn Write) -> io::Result<u64> {
        output.write_all(&self.buffer)?;
        Ok(self.buffer.len() as u64)
    }

    fn close(&mut self) -> io::Result<()> {
        self.buffer.clear();
        Ok(())
    }
}

/// Recorder that spills into a temp file in the OS temp directory.
///
/// With `delete_on_close` the file is removed when the recorder is
/// closed (or dropped); otherwise `close` persists it on disk.
#[derive(Debug)]
pub struct TempFileRecorder {
    file: Option<NamedTempFile>,
    delete_on_close: bool,
    written: usize,
}

impl TempFileRecorder {
    pub fn new(delete_on_close: bool) -> io::Result<Self> {
        Ok(Self {
            file: Some(new_temp_file()?),
            delete_on_close,
            written: 0,
        })
    }

    /// Path of the backing file while the recorder is open.
    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(NamedTempFile::path)
    }

    fn file_mut(&mut self) -> io::Result<&mut fs::File> {
        match self.file.as_mut() {
            Some(file) => Ok(file.as_file_mut()),
            None => Err(io::Error::new(
                io::ErrorKind::Other,
                "recorder is already closed",
            )),
        }
    }
}

impl Write for TempFileRecorder {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.file_mut()?.write(buf)?;
        self.written += written;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file_mut()?.flush()
    }
}

impl ResultRecorder for TempFileRecorder {
    fn len(&self) -> usize {
        self.written
    }

    fn write_to(&mut self, output: &mut dyn Write) -> io::Result<u64> {
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(0))?;
        io::copy(file, output)
    }

    fn close(&mut self) -> io::Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        if self.delete_on_close {
            file.close()
        } else {
            file.keep().map_err(|e| e.error)?;
            Ok(())
        }
    }
}

// Dropping an open recorder removes the temp file through the
// NamedTempFile guard, so an error exit cannot leak spilled output.

#[cfg(test)]
mod tests {
    use super::*;

    fn replay(recorder: &mut dyn ResultRecorder) -> Vec<u8> {
        let mut out = Vec::new();
        recorder.write_to(&mut out).unwrap();
        out
    }

    #[test]
    fn test_memory_recorder_records_and_replays() {
        let mut recorder = MemoryRecorder::new();
        recorder.write_all(b"Hello, ").unwrap();
        recorder.write_all(b"world!").unwrap();
        assert_eq!(recorder.len(), 13);
        assert_eq!(replay(&mut recorder), b"Hello, world!");
        // replay does not consume the capture
        assert_eq!(replay(&mut recorder), b"Hello, world!");
        recorder.close().unwrap();
        assert_eq!(recorder.len(), 0);
    }

    #[test]
    fn test_temp_file_recorder_spills_and_replays() {
        let mut recorder = TempFileRecorder::new(true).unwrap();
        recorder.write_all(b"spilled output").unwrap();
        assert_eq!(recorder.len(), 14);
        assert_eq!(replay(&mut recorder), b"spilled output");
        assert_eq!(replay(&mut recorder), b"spilled output");
    }

    #[test]
    fn test_temp_file_recorder_deletes_on_close() {
        let mut recorder = TempFileRecorder::new(true).unwrap();
        recorder.write_all(b"x").unwrap();
        let path = recorder.path().unwrap().to_path_buf();
        assert!(path.exists());
        recorder.close().unwrap();
        assert!(!path.exists());
        assert!(recorder.write_all(b"y").is_err());
    }

    #[test]
    fn test_temp_file_recorder_persists_without_delete_flag() {
        let mut recorder = TempFileRecorder::new(false).unwrap();
        recorder.write_all(b"kept").unwrap();
        let path = recorder.path().unwrap().to_path_buf();
        recorder.close().unwrap();
        assert!(path.exists());
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_temp_file_recorder_drop_removes_file() {
        let path = {
            let mut recorder = TempFileRecorder::new(true).unwrap();
            recorder.write_all(b"x").unwrap();
            recorder.path().unwrap().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_temp_file_name_carries_prefix() {
        let recorder = TempFileRecorder::new(true).unwrap();
        let name = recorder
            .path()
            .unwrap()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        assert!(name.starts_with(super::super::TEMP_FILE_PREFIX));
    }
}
