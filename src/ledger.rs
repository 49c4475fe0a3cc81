use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};

use crate::error::{FrequenciaError, Result};
use crate::model::{AttendanceRecord, LEDGER_HEADERS, LedgerRow};

pub fn ledger_path(data_dir: &Path, sheet: &str) -> PathBuf {
    data_dir.join(format!("lista_frequencia_ma_{sheet}.csv"))
}

/// The attendance ledger: a flat CSV file rewritten whole on every append.
///
/// Without `locked`, two writers racing on the same file lose one of the
/// appends (last rename wins).
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
    locked: bool,
}

impl Ledger {
    pub fn open<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            locked: false,
        }
    }

    /// Serializes appends behind an exclusive lock file.
    pub fn with_write_lock(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every stored row, in file order. A ledger that does not exist yet is
    /// empty.
    pub fn read_rows(&self) -> Result<Vec<LedgerRow>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(file);
        let mut rows = Vec::new();
        for result in rdr.deserialize() {
            rows.push(result.map_err(|source| FrequenciaError::CorruptFile {
                path: self.path.clone(),
                source,
            })?);
        }
        Ok(rows)
    }

    pub fn read_all(&self) -> Result<Vec<AttendanceRecord>> {
        self.read_rows()?
            .into_iter()
            .map(AttendanceRecord::try_from)
            .collect()
    }

    /// Reads the full snapshot, appends `batch` and writes the result back.
    /// Resubmissions are stored again; nothing is deduplicated. The ledger is
    /// left untouched when any step fails.
    pub fn append(&self, batch: &[AttendanceRecord]) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        let _lock = if self.locked {
            Some(WriteLock::acquire(&self.path)?)
        } else {
            None
        };
        let mut rows = self.read_rows()?;
        let previous = rows.len();
        rows.extend(batch.iter().map(AttendanceRecord::to_row));
        self.overwrite(&rows)?;
        log::info!(
            "appended {} rows to {} ({} before)",
            batch.len(),
            self.path.display(),
            previous
        );
        Ok(batch.len())
    }

    /// Writes a header-only ledger when the file does not exist.
    pub fn ensure_exists(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        self.overwrite(&[])?;
        Ok(true)
    }

    fn overwrite(&self, rows: &[LedgerRow]) -> Result<()> {
        let tmp = self.path.with_extension("csv.tmp");
        let result = self
            .write_rows(&tmp, rows)
            .map_err(|e| e.to_string())
            .and_then(|()| fs::rename(&tmp, &self.path).map_err(|e| e.to_string()));
        if let Err(reason) = result {
            let _ = fs::remove_file(&tmp);
            log::error!("could not write {}: {reason}", self.path.display());
            return Err(FrequenciaError::WriteFailed {
                path: self.path.clone(),
                reason,
            });
        }
        Ok(())
    }

    fn write_rows(&self, tmp: &Path, rows: &[LedgerRow]) -> csv::Result<()> {
        let mut wtr = WriterBuilder::new().has_headers(false).from_path(tmp)?;
        wtr.write_record(LEDGER_HEADERS)?;
        for row in rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

struct WriteLock {
    path: PathBuf,
}

impl WriteLock {
    fn acquire(ledger: &Path) -> Result<Self> {
        let path = ledger.with_extension("csv.lock");
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Self { path }),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(FrequenciaError::WriteFailed {
                    path: ledger.to_path_buf(),
                    reason: format!("outra gravação em andamento ({})", path.display()),
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("could not release {}: {e}", self.path.display());
        }
    }
}
