use anyhow::{Context, Result};
use csv::Writer;
use std::path::Path;

use crate::books::Catalog;
use crate::calendar::{default_range, generate_mondays, write_calendar};
use crate::config::Config;
use crate::ledger::Ledger;
use crate::model::ROSTER_HEADERS;

fn init_csv(path: &Path, headers: &[&str]) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    let mut wtr = Writer::from_path(path)?;
    wtr.write_record(headers)?;
    wtr.flush()?;
    Ok(true)
}

/// Creates the data directory and every file the dashboard reads, leaving
/// existing files alone.
pub fn init_data_dir(config: &Config) -> Result<()> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("criando {}", config.data_dir.display()))?;

    let mut created = Vec::new();
    let roster = config.roster_file();
    if init_csv(&roster, &ROSTER_HEADERS)? {
        created.push(roster);
    }
    let ledger = Ledger::open(config.ledger_file());
    if ledger.ensure_exists()? {
        created.push(ledger.path().to_path_buf());
    }
    if Catalog::open(config.catalog_file(), config.cover_dir()).ensure_exists()? {
        created.push(config.catalog_file());
    }
    let calendar = config.calendar_file();
    if !calendar.exists() {
        let (from, to) = default_range();
        write_calendar(&calendar, &generate_mondays(from, to))?;
        created.push(calendar);
    }

    if created.is_empty() {
        println!("Todos os arquivos já existem em {}", config.data_dir.display());
    }
    for path in created {
        println!("Arquivo criado: {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::EligibilityCalendar;
    use crate::roster::load_roster;
    use tempfile::TempDir;

    #[test]
    fn creates_every_file_once() {
        let dir = TempDir::new().unwrap();
        let config = Config::with_data_dir(dir.path().join("data"));
        init_data_dir(&config).unwrap();

        assert!(load_roster(config.roster_file()).unwrap().is_empty());
        assert!(Ledger::open(config.ledger_file()).read_all().unwrap().is_empty());
        assert!(config.cover_dir().is_dir());
        let calendar = EligibilityCalendar::load(config.calendar_file()).unwrap();
        assert!(calendar.is_eligible(chrono::NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()));

        std::fs::write(config.roster_file(), "1_momento,2_momento\nAna,\n").unwrap();
        init_data_dir(&config).unwrap();
        assert_eq!(load_roster(config.roster_file()).unwrap().len(), 1);
    }
}
