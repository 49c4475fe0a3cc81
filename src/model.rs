use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{FrequenciaError, Result};

/// Text format used for every date written to disk.
pub const DATE_FORMAT: &str = "%d/%m/%Y";

// `%Y` accepts two digit years, so the short form has to be tried first.
const ACCEPTED_DATE_FORMATS: [&str; 5] =
    ["%d/%m/%y", "%d/%m/%Y", "%Y-%m-%d", "%d-%m-%Y", "%d.%m.%Y"];

/// Parses a naive calendar date from any of the accepted textual formats.
///
/// `2025-01-06`, `06/01/2025` and `06/01/25` all resolve to the same date.
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    let text = text.trim();
    ACCEPTED_DATE_FORMATS
        .iter()
        .filter_map(|f| NaiveDate::parse_from_str(text, f).ok())
        .next()
        .ok_or_else(|| FrequenciaError::InvalidDate(text.to_string()))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// One of the two daily meeting windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Slot {
    First,
    Second,
}

impl Slot {
    pub fn number(self) -> u8 {
        match self {
            Slot::First => 1,
            Slot::Second => 2,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Slot::First => "Corrente - 6h às 7h - 1º Momento",
            Slot::Second => "Corrente - 7:15h às 8h - 2º Momento",
        }
    }
}

impl TryFrom<u8> for Slot {
    type Error = FrequenciaError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Slot::First),
            2 => Ok(Slot::Second),
            other => Err(FrequenciaError::InvalidColumn {
                column: "Momento",
                value: other.to_string(),
            }),
        }
    }
}

impl From<Slot> for u8 {
    fn from(slot: Slot) -> u8 {
        slot.number()
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PresenceState {
    #[serde(rename = "Presente")]
    Present,
    #[serde(rename = "Ausente")]
    Absent,
}

impl PresenceState {
    pub fn label(self) -> &'static str {
        match self {
            PresenceState::Present => "Presente",
            PresenceState::Absent => "Ausente",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PresenceMode {
    #[serde(rename = "Presencial")]
    OnSite,
    #[serde(rename = "Online")]
    Remote,
    #[serde(rename = "Ausente")]
    Absent,
}

impl PresenceMode {
    pub const ALL: [PresenceMode; 3] = [
        PresenceMode::OnSite,
        PresenceMode::Remote,
        PresenceMode::Absent,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PresenceMode::OnSite => "Presencial",
            PresenceMode::Remote => "Online",
            PresenceMode::Absent => "Ausente",
        }
    }
}

/// How a present participant attended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttendMode {
    OnSite,
    Remote,
}

/// Presence state and mode folded together so an absent record can never carry
/// an attendance mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Presence {
    Present(AttendMode),
    Absent,
}

impl Presence {
    pub fn state(self) -> PresenceState {
        match self {
            Presence::Present(_) => PresenceState::Present,
            Presence::Absent => PresenceState::Absent,
        }
    }

    pub fn mode(self) -> PresenceMode {
        match self {
            Presence::Present(AttendMode::OnSite) => PresenceMode::OnSite,
            Presence::Present(AttendMode::Remote) => PresenceMode::Remote,
            Presence::Absent => PresenceMode::Absent,
        }
    }

    pub fn is_present(self) -> bool {
        matches!(self, Presence::Present(_))
    }

    fn from_columns(state: PresenceState, mode: PresenceMode) -> Result<Self> {
        match (state, mode) {
            (PresenceState::Present, PresenceMode::OnSite) => {
                Ok(Presence::Present(AttendMode::OnSite))
            }
            (PresenceState::Present, PresenceMode::Remote) => {
                Ok(Presence::Present(AttendMode::Remote))
            }
            (PresenceState::Absent, PresenceMode::Absent) => Ok(Presence::Absent),
            (state, mode) => Err(FrequenciaError::InvalidColumn {
                column: "Tipo de presença",
                value: format!("{} com {}", mode.label(), state.label()),
            }),
        }
    }
}

/// `Data Correta` column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateCheck {
    #[serde(rename = "Sim")]
    Yes,
    // Ledgers written before the column existed read as unchecked.
    #[default]
    #[serde(rename = "Não")]
    No,
}

impl From<bool> for DateCheck {
    fn from(valid: bool) -> Self {
        if valid { DateCheck::Yes } else { DateCheck::No }
    }
}

/// A row of the ledger file exactly as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    #[serde(rename = "Data")]
    pub date: String,
    #[serde(rename = "Nome")]
    pub name: String,
    #[serde(rename = "Momento")]
    pub slot: Slot,
    #[serde(rename = "Frequência")]
    pub state: PresenceState,
    #[serde(rename = "Tipo de presença")]
    pub mode: PresenceMode,
    #[serde(rename = "Data Correta", default)]
    pub date_check: DateCheck,
}

pub const LEDGER_HEADERS: [&str; 6] = [
    "Data",
    "Nome",
    "Momento",
    "Frequência",
    "Tipo de presença",
    "Data Correta",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub name: String,
    pub date: NaiveDate,
    pub slot: Slot,
    pub presence: Presence,
    pub date_valid: bool,
}

impl AttendanceRecord {
    pub fn to_row(&self) -> LedgerRow {
        LedgerRow {
            date: format_date(self.date),
            name: self.name.clone(),
            slot: self.slot,
            state: self.presence.state(),
            mode: self.presence.mode(),
            date_check: self.date_valid.into(),
        }
    }
}

impl TryFrom<LedgerRow> for AttendanceRecord {
    type Error = FrequenciaError;

    fn try_from(row: LedgerRow) -> Result<Self> {
        Ok(AttendanceRecord {
            date: parse_date(&row.date)?,
            presence: Presence::from_columns(row.state, row.mode)?,
            name: row.name,
            slot: row.slot,
            date_valid: row.date_check == DateCheck::Yes,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RosterRow {
    #[serde(rename = "1_momento")]
    pub first: Option<String>,
    #[serde(rename = "2_momento")]
    pub second: Option<String>,
}

pub const ROSTER_HEADERS: [&str; 2] = ["1_momento", "2_momento"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub name: String,
    pub first_slot: bool,
    pub second_slot: bool,
}

impl Participant {
    pub fn in_slot(&self, slot: Slot) -> bool {
        match slot {
            Slot::First => self.first_slot,
            Slot::Second => self.second_slot,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CalendarRow {
    #[serde(rename = "Datas")]
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    #[serde(rename = "Título")]
    pub title: String,
    #[serde(rename = "Autor")]
    pub author: String,
    #[serde(rename = "Ano")]
    pub year: i32,
    #[serde(rename = "Capa")]
    pub cover: String,
}

pub const BOOK_HEADERS: [&str; 4] = ["Título", "Autor", "Ano", "Capa"];
