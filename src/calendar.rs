use std::collections::BTreeSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::{Datelike, Days, NaiveDate};
use csv::{ReaderBuilder, Writer};

use crate::error::{FrequenciaError, Result};
use crate::model::{CalendarRow, format_date, parse_date};

pub fn default_range() -> (NaiveDate, NaiveDate) {
    (
        NaiveDate::from_ymd_opt(2022, 1, 1).unwrap_or(NaiveDate::MIN),
        NaiveDate::from_ymd_opt(2040, 12, 31).unwrap_or(NaiveDate::MAX),
    )
}

/// Every Monday in `[from, to]`, ascending.
pub fn generate_mondays(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    let offset = (7 - from.weekday().num_days_from_monday()) % 7;
    let mut dates = Vec::new();
    let mut current = from.checked_add_days(Days::new(u64::from(offset)));
    while let Some(day) = current.filter(|d| *d <= to) {
        dates.push(day);
        current = day.checked_add_days(Days::new(7));
    }
    dates
}

/// Replaces the calendar file through a sibling temp file, so a failed
/// regeneration leaves the previous calendar in place.
pub fn write_calendar<P: AsRef<Path>>(path: P, dates: &[NaiveDate]) -> Result<()> {
    let path = path.as_ref();
    let tmp = path.with_extension("csv.tmp");
    let result = write_dates(&tmp, dates)
        .map_err(|e| e.to_string())
        .and_then(|()| fs::rename(&tmp, path).map_err(|e| e.to_string()));
    if let Err(reason) = result {
        let _ = fs::remove_file(&tmp);
        log::error!("could not write {}: {reason}", path.display());
        return Err(FrequenciaError::WriteFailed {
            path: path.to_path_buf(),
            reason,
        });
    }
    log::info!("wrote {} meeting dates to {}", dates.len(), path.display());
    Ok(())
}

fn write_dates(tmp: &Path, dates: &[NaiveDate]) -> csv::Result<()> {
    let mut wtr = Writer::from_path(tmp)?;
    for date in dates {
        wtr.serialize(CalendarRow {
            date: format_date(*date),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// The set of sanctioned meeting days.
#[derive(Debug, Clone)]
pub struct EligibilityCalendar {
    dates: BTreeSet<NaiveDate>,
}

impl EligibilityCalendar {
    #[cfg(test)]
    pub fn from_dates<I: IntoIterator<Item = NaiveDate>>(dates: I) -> Self {
        Self {
            dates: dates.into_iter().collect(),
        }
    }

    /// Loads the calendar file. Any unreadable row fails the whole load so a
    /// damaged calendar can never validate dates it should not.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let unavailable = |reason: String| FrequenciaError::CalendarUnavailable {
            path: path.to_path_buf(),
            reason,
        };
        let file = File::open(path).map_err(|e| unavailable(e.to_string()))?;
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(file);
        let mut dates = BTreeSet::new();
        for result in rdr.deserialize() {
            let row: CalendarRow = result.map_err(|e| unavailable(e.to_string()))?;
            dates.insert(parse_date(&row.date).map_err(|e| unavailable(e.to_string()))?);
        }
        if dates.is_empty() {
            return Err(unavailable("nenhuma data cadastrada".to_string()));
        }
        log::debug!("loaded {} meeting dates from {}", dates.len(), path.display());
        Ok(Self { dates })
    }

    pub fn is_eligible(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    pub fn previous(&self, date: NaiveDate) -> Option<NaiveDate> {
        self.dates.range(..date).next_back().copied()
    }

    pub fn next(&self, date: NaiveDate) -> Option<NaiveDate> {
        self.dates
            .range(date.succ_opt().unwrap_or(NaiveDate::MAX)..)
            .next()
            .copied()
    }
}

/// Outcome of checking a date against a calendar that may have failed to load.
#[derive(Debug)]
pub struct Eligibility {
    pub eligible: bool,
    pub warning: Option<String>,
}

impl Eligibility {
    /// Fails closed: with no calendar, nothing is eligible and the caller gets
    /// the load error back as a warning.
    pub fn resolve(
        calendar: std::result::Result<&EligibilityCalendar, &FrequenciaError>,
        date: NaiveDate,
    ) -> Self {
        match calendar {
            Ok(calendar) => Self {
                eligible: calendar.is_eligible(date),
                warning: None,
            },
            Err(e) => {
                log::warn!("treating {date} as not eligible: {e}");
                Self {
                    eligible: false,
                    warning: Some(e.to_string()),
                }
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct TodayStatus {
    pub today: NaiveDate,
    pub is_meeting_day: bool,
    pub previous: Option<NaiveDate>,
    pub next: Option<NaiveDate>,
}

pub fn today_status(calendar: &EligibilityCalendar, today: NaiveDate) -> TodayStatus {
    TodayStatus {
        today,
        is_meeting_day: calendar.is_eligible(today),
        previous: calendar.previous(today),
        next: calendar.next(today),
    }
}

pub fn calendar_path(data_dir: &Path) -> PathBuf {
    data_dir.join("segundas_feiras.csv")
}
