use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use crate::books::{catalog_path, cover_dir};
use crate::calendar::calendar_path;
use crate::ledger::ledger_path;
use crate::roster::roster_path;

/// Where the data files live and how they are accessed.
#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Directory holding roster, calendar, ledger and book catalog
    #[arg(long, global = true, env = "FREQUENCIA_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Ledger sheet identifier
    #[arg(long, global = true, env = "FREQUENCIA_SHEET", default_value = "2025")]
    pub sheet: String,

    /// Seconds a loaded roster or ledger is reused before re-reading
    #[arg(long, global = true, env = "FREQUENCIA_CACHE_TTL", default_value_t = 300)]
    pub cache_ttl: u64,

    /// Refuse to write while another writer holds the ledger
    #[arg(long, global = true, env = "FREQUENCIA_LOCK_WRITES")]
    pub lock_writes: bool,
}

impl Config {
    #[cfg(test)]
    pub fn with_data_dir<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.into(),
            sheet: "2025".to_string(),
            cache_ttl: 300,
            lock_writes: false,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    pub fn roster_file(&self) -> PathBuf {
        roster_path(&self.data_dir)
    }

    pub fn calendar_file(&self) -> PathBuf {
        calendar_path(&self.data_dir)
    }

    pub fn ledger_file(&self) -> PathBuf {
        ledger_path(&self.data_dir, &self.sheet)
    }

    pub fn catalog_file(&self) -> PathBuf {
        catalog_path(&self.data_dir)
    }

    pub fn cover_dir(&self) -> PathBuf {
        cover_dir(&self.data_dir)
    }
}
