use chrono::NaiveDate;

use crate::builder::{Selections, Skipped, build_batch};
use crate::cache::TimedCache;
use crate::calendar::{Eligibility, EligibilityCalendar};
use crate::config::Config;
use crate::error::{FrequenciaError, Result};
use crate::ledger::Ledger;
use crate::model::{AttendanceRecord, Participant, Slot};
use crate::roster::{load_roster, slot_members};

/// One interactive session: the loaded calendar plus short-lived caches of the
/// roster and the ledger.
///
/// Load failures never abort a view. They are logged, kept as warnings for the
/// caller to show, and the view continues with an empty result.
pub struct Dashboard {
    config: Config,
    calendar: std::result::Result<EligibilityCalendar, FrequenciaError>,
    ledger: Ledger,
    roster_cache: TimedCache<Vec<Participant>>,
    ledger_cache: TimedCache<Vec<AttendanceRecord>>,
    warnings: Vec<String>,
}

#[derive(Debug)]
pub struct SubmitOutcome {
    pub date: NaiveDate,
    pub slot: Slot,
    pub date_valid: bool,
    pub written: usize,
    pub skipped: Vec<Skipped>,
    pub warnings: Vec<String>,
}

impl Dashboard {
    pub fn new(config: Config) -> Self {
        let calendar = EligibilityCalendar::load(config.calendar_file());
        if let Err(e) = &calendar {
            log::warn!("{e}");
        }
        let ledger = Ledger::open(config.ledger_file()).with_write_lock(config.lock_writes);
        let ttl = config.cache_ttl();
        Self {
            config,
            calendar,
            ledger,
            roster_cache: TimedCache::new(ttl),
            ledger_cache: TimedCache::new(ttl),
            warnings: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn calendar(&self) -> std::result::Result<&EligibilityCalendar, &FrequenciaError> {
        self.calendar.as_ref()
    }

    pub fn reload_calendar(&mut self) {
        self.calendar = EligibilityCalendar::load(self.config.calendar_file());
    }

    pub fn eligibility(&self, date: NaiveDate) -> Eligibility {
        Eligibility::resolve(self.calendar(), date)
    }

    pub fn roster(&mut self) -> Vec<Participant> {
        let path = self.config.roster_file();
        match self.roster_cache.get_or_try_load(|| load_roster(&path)) {
            Ok(roster) => roster.clone(),
            Err(e) => {
                self.warn(e);
                Vec::new()
            }
        }
    }

    pub fn ledger_snapshot(&mut self) -> Vec<AttendanceRecord> {
        let ledger = &self.ledger;
        match self.ledger_cache.get_or_try_load(|| ledger.read_all()) {
            Ok(records) => records.clone(),
            Err(e) => {
                self.warn(e);
                Vec::new()
            }
        }
    }

    /// Warnings gathered since the last call.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    /// Validates the date, builds the batch and appends it to the ledger. The
    /// batch counts as committed only when this returns `Ok`.
    pub fn submit(
        &mut self,
        slot: Slot,
        date: NaiveDate,
        selections: &Selections,
    ) -> Result<SubmitOutcome> {
        let eligibility = self.eligibility(date);
        let roster = self.roster();
        let members = slot_members(&roster, slot);
        let batch = build_batch(date, slot, &members, selections, eligibility.eligible);

        let mut warnings = self.take_warnings();
        warnings.extend(eligibility.warning);
        warnings.extend(batch.warnings());

        let written = self.ledger.append(&batch.records)?;
        if written > 0 {
            self.ledger_cache.invalidate();
        }
        Ok(SubmitOutcome {
            date,
            slot,
            date_valid: eligibility.eligible,
            written,
            skipped: batch.skipped,
            warnings,
        })
    }

    fn warn(&mut self, e: FrequenciaError) {
        log::warn!("{e}");
        self.warnings.push(e.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Selection;
    use crate::calendar::{generate_mondays, write_calendar};
    use crate::model::AttendMode;
    use std::fs;
    use tempfile::TempDir;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup() -> (TempDir, Dashboard) {
        let dir = TempDir::new().unwrap();
        let config = Config::with_data_dir(dir.path());
        fs::write(config.roster_file(), "1_momento,2_momento\nAna,\n").unwrap();
        write_calendar(
            config.calendar_file(),
            &generate_mondays(ymd(2025, 1, 1), ymd(2025, 12, 31)),
        )
        .unwrap();
        let dashboard = Dashboard::new(config);
        (dir, dashboard)
    }

    fn ana_on_site() -> Selections {
        let mut selections = Selections::default();
        selections.insert(
            "Ana",
            Selection::Present {
                mode: AttendMode::OnSite,
            },
        );
        selections
    }

    #[test]
    fn submission_on_meeting_day_is_marked_valid() {
        let (_dir, mut dashboard) = setup();
        let outcome = dashboard
            .submit(Slot::First, ymd(2025, 1, 6), &ana_on_site())
            .unwrap();
        assert!(outcome.date_valid);
        assert_eq!(outcome.written, 1);

        let contents = fs::read_to_string(dashboard.config().ledger_file()).unwrap();
        assert_eq!(
            contents.lines().nth(1),
            Some("06/01/2025,Ana,1,Presente,Presencial,Sim")
        );
    }

    #[test]
    fn submission_off_calendar_is_marked_invalid() {
        let (_dir, mut dashboard) = setup();
        let outcome = dashboard
            .submit(Slot::First, ymd(2025, 1, 7), &ana_on_site())
            .unwrap();
        assert!(!outcome.date_valid);

        let contents = fs::read_to_string(dashboard.config().ledger_file()).unwrap();
        assert_eq!(
            contents.lines().nth(1),
            Some("07/01/2025,Ana,1,Presente,Presencial,Não")
        );
    }

    #[test]
    fn missing_calendar_fails_closed_but_still_records() {
        let (dir, _) = setup();
        fs::remove_file(Config::with_data_dir(dir.path()).calendar_file()).unwrap();
        let mut dashboard = Dashboard::new(Config::with_data_dir(dir.path()));

        let outcome = dashboard
            .submit(Slot::First, ymd(2025, 1, 6), &ana_on_site())
            .unwrap();
        assert!(!outcome.date_valid);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(!dashboard.ledger_snapshot()[0].date_valid);
    }

    #[test]
    fn snapshot_is_refreshed_after_submit() {
        let (_dir, mut dashboard) = setup();
        assert!(dashboard.ledger_snapshot().is_empty());
        dashboard
            .submit(Slot::First, ymd(2025, 1, 6), &ana_on_site())
            .unwrap();
        assert_eq!(dashboard.ledger_snapshot().len(), 1);
    }

    #[test]
    fn missing_roster_yields_warning_and_empty_batch() {
        let (dir, mut dashboard) = setup();
        fs::remove_file(dashboard.config().roster_file()).unwrap();
        let outcome = dashboard
            .submit(Slot::First, ymd(2025, 1, 6), &ana_on_site())
            .unwrap();
        assert_eq!(outcome.written, 0);
        assert_eq!(outcome.warnings.len(), 2);
        assert!(!Config::with_data_dir(dir.path()).ledger_file().exists());
    }

    #[test]
    fn unwritable_ledger_reports_failure() {
        let (_dir, mut dashboard) = setup();
        fs::create_dir_all(dashboard.config().ledger_file()).unwrap();
        let result = dashboard.submit(Slot::First, ymd(2025, 1, 6), &ana_on_site());
        assert!(result.is_err());
    }
}
