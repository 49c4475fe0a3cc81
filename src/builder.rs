use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::error::FrequenciaError;
use crate::model::{AttendMode, AttendanceRecord, Participant, Presence, Slot};

/// Raw checkbox state collected for one participant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Marks {
    pub present: bool,
    pub absent: bool,
    pub on_site: bool,
    pub remote: bool,
}

/// Parsed form of `NAME=FLAGS`, where FLAGS is a comma separated subset of
/// `presente`, `ausente`, `presencial` and `online`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkArg {
    pub name: String,
    pub marks: Marks,
}

impl FromStr for MarkArg {
    type Err = FrequenciaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || FrequenciaError::InvalidMark(s.to_string());
        let (name, flags) = s.rsplit_once('=').ok_or_else(invalid)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(invalid());
        }
        let mut marks = Marks::default();
        for flag in flags.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            match flag.to_lowercase().as_str() {
                "presente" | "p" => marks.present = true,
                "ausente" | "a" => marks.absent = true,
                "presencial" => {
                    marks.present = true;
                    marks.on_site = true;
                }
                "online" => {
                    marks.present = true;
                    marks.remote = true;
                }
                _ => return Err(invalid()),
            }
        }
        Ok(MarkArg {
            name: name.to_string(),
            marks,
        })
    }
}

/// What was submitted for one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Present { mode: AttendMode },
    Absent,
    Unset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    PresentAndAbsent,
    BothModes,
    MissingMode,
}

impl Conflict {
    pub fn message(self) -> &'static str {
        match self {
            Conflict::PresentAndAbsent => "Presença e ausência não podem ser selecionados juntos",
            Conflict::BothModes => "Presencial e Online não podem ser selecionados juntos",
            Conflict::MissingMode => "Defina o tipo de presença (Presencial ou Online)",
        }
    }
}

impl TryFrom<Marks> for Selection {
    type Error = Conflict;

    fn try_from(marks: Marks) -> Result<Self, Conflict> {
        match (marks.present, marks.absent) {
            (true, true) => Err(Conflict::PresentAndAbsent),
            (false, true) => Ok(Selection::Absent),
            (false, false) => Ok(Selection::Unset),
            (true, false) => match (marks.on_site, marks.remote) {
                (true, true) => Err(Conflict::BothModes),
                (true, false) => Ok(Selection::Present {
                    mode: AttendMode::OnSite,
                }),
                (false, true) => Ok(Selection::Present {
                    mode: AttendMode::Remote,
                }),
                (false, false) => Err(Conflict::MissingMode),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Conflict(Conflict),
    Unset,
    NotInSlot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub name: String,
    pub reason: SkipReason,
}

#[derive(Debug, Default)]
pub struct Selections {
    chosen: BTreeMap<String, Selection>,
    conflicts: BTreeMap<String, Conflict>,
}

impl Selections {
    /// Folds raw marks into one selection per participant. A name given more
    /// than once has its marks merged, the way ticking several boxes would.
    pub fn from_marks<I: IntoIterator<Item = MarkArg>>(marks: I) -> Self {
        let mut merged: BTreeMap<String, Marks> = BTreeMap::new();
        for arg in marks {
            let entry = merged.entry(arg.name).or_default();
            entry.present |= arg.marks.present;
            entry.absent |= arg.marks.absent;
            entry.on_site |= arg.marks.on_site;
            entry.remote |= arg.marks.remote;
        }
        let mut selections = Selections::default();
        for (name, marks) in merged {
            match Selection::try_from(marks) {
                Ok(selection) => selections.insert(name, selection),
                Err(conflict) => {
                    selections.conflicts.insert(name, conflict);
                }
            }
        }
        selections
    }

    pub fn insert(&mut self, name: impl Into<String>, selection: Selection) {
        let name = name.into();
        self.conflicts.remove(&name);
        self.chosen.insert(name, selection);
    }

    pub fn get(&self, name: &str) -> Selection {
        self.chosen.get(name).copied().unwrap_or(Selection::Unset)
    }

    fn conflict(&self, name: &str) -> Option<Conflict> {
        self.conflicts.get(name).copied()
    }

    fn names(&self) -> impl Iterator<Item = &String> {
        self.chosen.keys().chain(self.conflicts.keys())
    }
}

#[derive(Debug, Default)]
pub struct Batch {
    pub records: Vec<AttendanceRecord>,
    pub skipped: Vec<Skipped>,
}

impl Batch {
    pub fn warnings(&self) -> impl Iterator<Item = String> + '_ {
        self.skipped.iter().filter_map(|s| match &s.reason {
            SkipReason::Conflict(c) => Some(format!("{}: {}", s.name, c.message())),
            SkipReason::NotInSlot => Some(format!("{}: não participa deste momento", s.name)),
            SkipReason::Unset => None,
        })
    }
}

/// Builds the records of one submission. Only members of `slot` are
/// considered; unset or conflicting participants are skipped, never stored.
pub fn build_batch(
    date: NaiveDate,
    slot: Slot,
    members: &[&Participant],
    selections: &Selections,
    date_valid: bool,
) -> Batch {
    let mut batch = Batch::default();
    for participant in members.iter().filter(|p| p.in_slot(slot)) {
        let name = &participant.name;
        if let Some(conflict) = selections.conflict(name) {
            batch.skipped.push(Skipped {
                name: name.clone(),
                reason: SkipReason::Conflict(conflict),
            });
            continue;
        }
        let presence = match selections.get(name) {
            Selection::Present { mode } => Presence::Present(mode),
            Selection::Absent => Presence::Absent,
            Selection::Unset => {
                batch.skipped.push(Skipped {
                    name: name.clone(),
                    reason: SkipReason::Unset,
                });
                continue;
            }
        };
        batch.records.push(AttendanceRecord {
            name: name.clone(),
            date,
            slot,
            presence,
            date_valid,
        });
    }

    for name in selections.names() {
        if !members.iter().any(|p| &p.name == name && p.in_slot(slot)) {
            batch.skipped.push(Skipped {
                name: name.clone(),
                reason: SkipReason::NotInSlot,
            });
        }
    }

    log::debug!(
        "built {} records for slot {slot} on {date}, {} skipped",
        batch.records.len(),
        batch.skipped.len()
    );
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PresenceMode, PresenceState};

    fn participant(name: &str, first: bool, second: bool) -> Participant {
        Participant {
            name: name.to_string(),
            first_slot: first,
            second_slot: second,
        }
    }

    fn marks(s: &str) -> MarkArg {
        s.parse().unwrap()
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()
    }

    #[test]
    fn parses_mark_arguments() {
        let arg = marks("Ana Paula=presente,presencial");
        assert_eq!(arg.name, "Ana Paula");
        assert!(arg.marks.present && arg.marks.on_site);
        assert!(!arg.marks.absent && !arg.marks.remote);

        assert!(marks("Bia=online").marks.present);
        assert!(marks("Caio=").marks == Marks::default());
        assert!("Caio".parse::<MarkArg>().is_err());
        assert!("=ausente".parse::<MarkArg>().is_err());
        assert!("Caio=talvez".parse::<MarkArg>().is_err());
    }

    #[test]
    fn marks_resolve_to_selection_or_conflict() {
        let sel = |present, absent, on_site, remote| {
            Selection::try_from(Marks {
                present,
                absent,
                on_site,
                remote,
            })
        };
        assert_eq!(sel(false, false, false, false), Ok(Selection::Unset));
        assert_eq!(sel(false, true, false, false), Ok(Selection::Absent));
        assert_eq!(
            sel(true, false, false, true),
            Ok(Selection::Present {
                mode: AttendMode::Remote
            })
        );
        assert_eq!(sel(true, true, true, false), Err(Conflict::PresentAndAbsent));
        assert_eq!(sel(true, false, true, true), Err(Conflict::BothModes));
        assert_eq!(sel(true, false, false, false), Err(Conflict::MissingMode));
    }

    #[test]
    fn conflicting_and_unset_participants_are_skipped() {
        let roster = [
            participant("Ana", true, false),
            participant("Bruno", true, false),
            participant("Carla", true, false),
            participant("Davi", true, false),
        ];
        let members: Vec<_> = roster.iter().collect();
        let selections = Selections::from_marks([
            marks("Ana=presencial"),
            marks("Bruno=presente,ausente"),
            marks("Davi=ausente"),
        ]);

        let batch = build_batch(monday(), Slot::First, &members, &selections, true);

        let names: Vec<_> = batch.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Ana", "Davi"]);
        assert!(batch.skipped.contains(&Skipped {
            name: "Bruno".to_string(),
            reason: SkipReason::Conflict(Conflict::PresentAndAbsent),
        }));
        assert!(batch.skipped.contains(&Skipped {
            name: "Carla".to_string(),
            reason: SkipReason::Unset,
        }));
        assert_eq!(batch.warnings().count(), 1);
    }

    #[test]
    fn absent_mode_iff_absent_state() {
        let roster = [participant("Ana", true, true), participant("Bia", true, true)];
        let members: Vec<_> = roster.iter().collect();
        let selections = Selections::from_marks([marks("Ana=online"), marks("Bia=ausente")]);
        let batch = build_batch(monday(), Slot::Second, &members, &selections, false);
        assert_eq!(batch.records.len(), 2);
        for record in &batch.records {
            let row = record.to_row();
            assert_eq!(
                row.mode == PresenceMode::Absent,
                row.state == PresenceState::Absent
            );
            assert!(!record.date_valid);
        }
    }

    #[test]
    fn selections_outside_the_slot_are_ignored() {
        let roster = [participant("Ana", true, false), participant("Bia", false, true)];
        let members: Vec<_> = roster.iter().collect();
        let selections = Selections::from_marks([
            marks("Ana=presencial"),
            marks("Bia=presencial"),
            marks("Zé=ausente"),
        ]);
        let batch = build_batch(monday(), Slot::First, &members, &selections, true);
        assert_eq!(batch.records.len(), 1);
        let outside: Vec<_> = batch
            .skipped
            .iter()
            .filter(|s| s.reason == SkipReason::NotInSlot)
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(outside, ["Bia", "Zé"]);
    }

    #[test]
    fn repeated_names_merge_their_marks() {
        let selections =
            Selections::from_marks([marks("Ana=presente"), marks("Ana=presencial")]);
        assert_eq!(
            selections.get("Ana"),
            Selection::Present {
                mode: AttendMode::OnSite
            }
        );
        let selections = Selections::from_marks([marks("Ana=presencial"), marks("Ana=ausente")]);
        assert_eq!(selections.get("Ana"), Selection::Unset);
        assert_eq!(selections.conflict("Ana"), Some(Conflict::PresentAndAbsent));
    }
}
