use crate::accessor::SubtaskAccessor;
use crate::logs::{subtask_log_path, SubtaskLogEntry};
use crate::shared::ids::SubtaskId;
use crate::shared::time::{calendar_day, now_millis};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Captured bytes are handed to the log stream once this many are pending.
const CAPTURE_CHUNK_BYTES: usize = 64 * 1024;

/// Writer handed to a runner for one attempt.
///
/// Every byte is captured for the persisted log stream, which receives it in
/// line-aligned chunks and finally as one entry when the sink is closed. The
/// per-day file is a troubleshooting copy: if it cannot be opened or written,
/// the stream still gets everything. Dropping the sink closes it.
pub struct SubtaskOutput<'a> {
    subtask_id: SubtaskId,
    run_time: u32,
    path: Option<PathBuf>,
    file: Option<BufWriter<File>>,
    file_error: Option<io::Error>,
    captured: Vec<u8>,
    closed: bool,
    accessor: &'a SubtaskAccessor,
}

impl<'a> SubtaskOutput<'a> {
    pub fn open(
        state_root: &Path,
        subtask_id: SubtaskId,
        run_time: u32,
        header: &str,
        accessor: &'a SubtaskAccessor,
    ) -> io::Result<Self> {
        let path = subtask_log_path(state_root, calendar_day(now_millis()), subtask_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut file = BufWriter::new(file);
        file.write_all(header.as_bytes())?;

        let mut output = Self::detached(subtask_id, run_time, accessor);
        output.path = Some(path);
        output.file = Some(file);
        Ok(output)
    }

    /// A sink that only feeds the log stream.
    pub fn detached(subtask_id: SubtaskId, run_time: u32, accessor: &'a SubtaskAccessor) -> Self {
        Self {
            subtask_id,
            run_time,
            path: None,
            file: None,
            file_error: None,
            captured: Vec::new(),
            closed: false,
            accessor,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Flushes the file and hands captured bytes to the log stream. Safe to
    /// call more than once. Reports the first file error seen, if any.
    pub fn close(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            if let Err(err) = file.flush() {
                self.file_error.get_or_insert(err);
            }
        }
        self.hand_off(self.captured.len());
        self.closed = true;
        match self.file_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn hand_off(&mut self, upto: usize) {
        if upto == 0 {
            return;
        }
        let chunk = self.captured.drain(..upto).collect::<Vec<u8>>();
        self.accessor.append_log(&SubtaskLogEntry::new(
            self.subtask_id,
            self.run_time,
            String::from_utf8_lossy(&chunk).into_owned(),
            now_millis(),
        ));
    }
}

impl Write for SubtaskOutput<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::other("subtask output already closed"));
        }
        self.captured.extend_from_slice(buf);

        if let Some(file) = self.file.as_mut() {
            if let Err(err) = file.write_all(buf) {
                self.file = None;
                self.file_error.get_or_insert(err);
            }
        }

        if self.captured.len() >= CAPTURE_CHUNK_BYTES {
            let upto = self
                .captured
                .iter()
                .rposition(|byte| *byte == b'\n')
                .map_or(self.captured.len(), |idx| idx + 1);
            self.hand_off(upto);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for SubtaskOutput<'_> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::{SqliteSubtaskRepository, SubtaskRepository};
    use crate::shared::logging::EngineLog;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn accessor(root: &Path) -> SubtaskAccessor {
        let repo = SqliteSubtaskRepository::open(&root.join("engine.db")).expect("open");
        repo.ensure_schema().expect("schema");
        SubtaskAccessor::new(Arc::new(repo), EngineLog::disabled())
    }

    #[test]
    fn drop_flushes_file_and_log_stream() {
        let dir = tempdir().expect("tempdir");
        let accessor = accessor(dir.path());
        let path = {
            let mut output =
                SubtaskOutput::open(dir.path(), SubtaskId(8), 1, "#### header ####\n", &accessor)
                    .expect("open output");
            writeln!(output, "step one").expect("write");
            writeln!(output, "step two").expect("write");
            output.path().expect("file-backed").to_path_buf()
        };

        let file = fs::read_to_string(&path).expect("read log file");
        assert_eq!(file, "#### header ####\nstep one\nstep two\n");

        let entries = accessor.repository().load_logs(SubtaskId(8)).expect("logs");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, "step one\nstep two\n");
        assert_eq!(entries[0].run_time, 1);
    }

    #[test]
    fn silent_attempt_appends_nothing_and_rejects_late_writes() {
        let dir = tempdir().expect("tempdir");
        let accessor = accessor(dir.path());
        let mut output = SubtaskOutput::open(dir.path(), SubtaskId(9), 1, "", &accessor)
            .expect("open output");
        output.close().expect("close");
        output.close().expect("second close");
        assert!(output.write_all(b"late").is_err());
        drop(output);

        assert!(accessor
            .repository()
            .load_logs(SubtaskId(9))
            .expect("logs")
            .is_empty());
    }

    #[test]
    fn long_output_is_handed_off_in_line_aligned_chunks() {
        let dir = tempdir().expect("tempdir");
        let accessor = accessor(dir.path());
        let line = format!("{}\n", "x".repeat(1023));
        let lines = 200;
        {
            let mut output = SubtaskOutput::open(dir.path(), SubtaskId(10), 1, "", &accessor)
                .expect("open output");
            for _ in 0..lines {
                output.write_all(line.as_bytes()).expect("write");
                assert!(output.captured.len() < CAPTURE_CHUNK_BYTES);
            }
        }

        let entries = accessor.repository().load_logs(SubtaskId(10)).expect("logs");
        assert!(entries.len() > 1);
        assert!(entries.iter().all(|entry| entry.content.ends_with('\n')));
        let joined = entries.iter().map(|entry| entry.content.as_str()).collect::<String>();
        assert_eq!(joined, line.repeat(lines));
    }

    #[test]
    fn detached_sink_still_feeds_the_log_stream() {
        let dir = tempdir().expect("tempdir");
        let accessor = accessor(dir.path());
        let mut output = SubtaskOutput::detached(SubtaskId(11), 2, &accessor);
        assert!(output.path().is_none());
        writeln!(output, "no file today").expect("write");
        output.close().expect("close");

        let entries = accessor.repository().load_logs(SubtaskId(11)).expect("logs");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, "no file today\n");
        assert_eq!(entries[0].run_time, 2);
    }
}
