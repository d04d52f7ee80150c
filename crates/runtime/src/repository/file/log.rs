//! Append-only log files.
//!
//! [`FileRepository<T>`] stores any serializable record type; the combat log
//! repository keeps one such file per match, open only while the match is
//! still logging.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind as IoErrorKind, Read, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Serialize, de::DeserializeOwned};

use combat_core::{LogEntry, MatchId};

use crate::repository::{LogRepository, RepositoryError, Result};

/// Generic file-based repository for append-only logs.
///
/// Record format:
/// ```text
/// [u32 length][bincode serialized T]
/// [u32 length][bincode serialized T]
/// ...
/// ```
pub(crate) struct FileRepository<T> {
    path: PathBuf,
    writer: BufWriter<File>,
    /// Byte offset of the next write.
    current_offset: u64,
    _phantom: PhantomData<T>,
}

impl<T> FileRepository<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Opens `base_dir/filename` for appending, creating both if needed.
    pub(crate) fn open_or_create(base_dir: impl AsRef<Path>, filename: impl AsRef<str>) -> Result<Self> {
        let base_dir = base_dir.as_ref();
        std::fs::create_dir_all(base_dir).map_err(RepositoryError::Io)?;

        let path = base_dir.join(filename.as_ref());
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(RepositoryError::Io)?;

        let current_offset = file.metadata().map_err(RepositoryError::Io)?.len();
        let writer = BufWriter::new(file);

        tracing::debug!(
            target: "arena::repository",
            path = %path.display(),
            offset = current_offset,
            "opened log file"
        );

        Ok(Self {
            path,
            writer,
            current_offset,
            _phantom: PhantomData,
        })
    }

    /// Appends a record and returns the byte offset it was written at.
    ///
    /// The record is buffered; call [`flush`](Self::flush) to persist it.
    pub(crate) fn append(&mut self, item: &T) -> Result<u64> {
        let offset = self.current_offset;

        let bytes =
            bincode::serialize(item).map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        let len = u32::try_from(bytes.len()).map_err(|_| {
            RepositoryError::Serialization(format!("record of {} bytes too large", bytes.len()))
        })?;

        self.writer
            .write_all(&len.to_le_bytes())
            .map_err(RepositoryError::Io)?;
        self.writer.write_all(&bytes).map_err(RepositoryError::Io)?;

        self.current_offset += 4 + bytes.len() as u64;
        Ok(offset)
    }

    /// Flushes buffered records and syncs them to disk.
    pub(crate) fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(RepositoryError::Io)?;
        self.writer.get_ref().sync_data().map_err(RepositoryError::Io)?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every record in `path`. A missing file reads as empty.
    pub(crate) fn read_all(path: impl AsRef<Path>) -> Result<Vec<T>> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(RepositoryError::Io(e)),
        };

        let mut reader = BufReader::new(file);
        let mut items = Vec::new();

        loop {
            let mut len_bytes = [0u8; 4];
            match reader.read_exact(&mut len_bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == IoErrorKind::UnexpectedEof => break,
                Err(e) => return Err(RepositoryError::Io(e)),
            }
            let len = u32::from_le_bytes(len_bytes) as usize;

            let mut data = vec![0u8; len];
            reader.read_exact(&mut data).map_err(|e| {
                if e.kind() == IoErrorKind::UnexpectedEof {
                    RepositoryError::CorruptedData(format!(
                        "truncated record {} in {}",
                        items.len(),
                        path.display()
                    ))
                } else {
                    RepositoryError::Io(e)
                }
            })?;

            let item = bincode::deserialize(&data)
                .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
            items.push(item);
        }

        Ok(items)
    }
}

impl<T> Drop for FileRepository<T> {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            tracing::warn!(
                target: "arena::repository",
                path = %self.path.display(),
                error = %e,
                "failed to flush log file on drop"
            );
        }
    }
}

/// One `log_{id}.log` file per match under `base_dir`.
pub struct FileLogRepository {
    base_dir: PathBuf,
    writers: Mutex<HashMap<MatchId, Writer>>,
}

struct Writer {
    file: FileRepository<LogEntry>,
    next_sequence: u32,
}

impl FileLogRepository {
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_dir).map_err(RepositoryError::Io)?;
        Ok(Self {
            base_dir,
            writers: Mutex::new(HashMap::new()),
        })
    }

    /// Number of match logs currently held open for appending.
    pub fn open_writers(&self) -> Result<usize> {
        let writers = self
            .writers
            .lock()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        Ok(writers.len())
    }

    fn filename(match_id: MatchId) -> String {
        format!("log_{}.log", match_id.0)
    }

    fn open_writer(&self, match_id: MatchId) -> Result<Writer> {
        let filename = Self::filename(match_id);
        let existing = FileRepository::<LogEntry>::read_all(self.base_dir.join(&filename))?;
        let file = FileRepository::open_or_create(&self.base_dir, &filename)?;
        Ok(Writer {
            file,
            next_sequence: existing.len() as u32,
        })
    }
}

impl LogRepository for FileLogRepository {
    fn append(&self, match_id: MatchId, entry: &LogEntry) -> Result<()> {
        let mut writers = self
            .writers
            .lock()
            .map_err(|_| RepositoryError::LockPoisoned)?;

        let writer = match writers.entry(match_id) {
            Entry::Occupied(slot) => slot.into_mut(),
            Entry::Vacant(slot) => slot.insert(self.open_writer(match_id)?),
        };

        if entry.sequence != writer.next_sequence {
            return Err(RepositoryError::SequenceGap {
                match_id,
                expected: writer.next_sequence,
                found: entry.sequence,
            });
        }

        writer.file.append(entry)?;
        writer.file.flush()?;
        writer.next_sequence += 1;
        Ok(())
    }

    fn load(&self, match_id: MatchId) -> Result<Vec<LogEntry>> {
        // Holding the lock keeps a concurrent append from being half-read.
        let _writers = self
            .writers
            .lock()
            .map_err(|_| RepositoryError::LockPoisoned)?;

        FileRepository::<LogEntry>::read_all(self.base_dir.join(Self::filename(match_id)))
    }

    fn seal(&self, match_id: MatchId) -> Result<()> {
        let mut writers = self
            .writers
            .lock()
            .map_err(|_| RepositoryError::LockPoisoned)?;

        if let Some(mut writer) = writers.remove(&match_id) {
            writer.file.flush()?;
            tracing::debug!(
                target: "arena::repository",
                %match_id,
                entries = writer.next_sequence,
                "sealed log file"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use combat_core::{ActionKind, StatusEffect};
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestItem {
        id: u64,
        name: String,
    }

    fn entry(sequence: u32) -> LogEntry {
        LogEntry {
            sequence,
            turn: sequence,
            offset_ms: sequence as u64 * 4_000,
            actor_id: "alpha".into(),
            target_id: "beta".into(),
            action_kind: ActionKind::Attack,
            damage: 4,
            effect: None,
            health_after: 96,
            narration: "alpha strikes beta for 4".into(),
        }
    }

    #[test]
    fn append_then_read_all() {
        let temp_dir = TempDir::new().unwrap();
        let mut repo = FileRepository::<TestItem>::open_or_create(temp_dir.path(), "test.log").unwrap();

        let first = TestItem {
            id: 1,
            name: "first".to_string(),
        };
        let second = TestItem {
            id: 2,
            name: "second".to_string(),
        };

        assert_eq!(repo.append(&first).unwrap(), 0);
        assert!(repo.append(&second).unwrap() > 0);
        repo.flush().unwrap();

        let items = FileRepository::<TestItem>::read_all(repo.path()).unwrap();
        assert_eq!(items, vec![first, second]);
        assert!(
            FileRepository::<TestItem>::read_all(temp_dir.path().join("missing.log"))
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn truncated_record_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.log");
        std::fs::write(&path, [16u8, 0, 0, 0, 1, 2]).unwrap();

        let err = FileRepository::<TestItem>::read_all(&path).unwrap_err();
        assert!(matches!(err, RepositoryError::CorruptedData(_)));
    }

    #[test]
    fn match_logs_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let id = MatchId(9);

        {
            let repo = FileLogRepository::new(temp_dir.path()).unwrap();
            repo.append(id, &entry(0)).unwrap();
            let mut injury = entry(1);
            injury.damage = 0;
            injury.effect = Some(StatusEffect::Injury { penalty: 1 });
            repo.append(id, &injury).unwrap();
        }

        let repo = FileLogRepository::new(temp_dir.path()).unwrap();
        assert!(matches!(
            repo.append(id, &entry(0)),
            Err(RepositoryError::SequenceGap { expected: 2, .. })
        ));
        repo.append(id, &entry(2)).unwrap();

        let log = repo.load(id).unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log[1].effect, Some(StatusEffect::Injury { penalty: 1 }));
        assert!(repo.load(MatchId(10)).unwrap().is_empty());
    }

    #[test]
    fn sealing_releases_the_writer() {
        let temp_dir = TempDir::new().unwrap();
        let repo = FileLogRepository::new(temp_dir.path()).unwrap();

        for id in 1..=3 {
            repo.append(MatchId(id), &entry(0)).unwrap();
        }
        assert_eq!(repo.open_writers().unwrap(), 3);

        for id in 1..=3 {
            repo.seal(MatchId(id)).unwrap();
        }
        repo.seal(MatchId(99)).unwrap();
        assert_eq!(repo.open_writers().unwrap(), 0);

        // Reopening picks up where the sealed file left off.
        repo.append(MatchId(1), &entry(1)).unwrap();
        assert_eq!(repo.open_writers().unwrap(), 1);
        assert_eq!(repo.load(MatchId(1)).unwrap().len(), 2);
    }
}
