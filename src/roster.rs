use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;

use crate::error::{FrequenciaError, Result};
use crate::model::{Participant, RosterRow, Slot};

pub fn roster_path(data_dir: &Path) -> PathBuf {
    data_dir.join("participantes_momentos.csv")
}

fn clean(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

/// Loads the roster. Either column of a row may be empty; a name appearing in
/// both columns becomes one participant belonging to both slots.
pub fn load_roster<P: AsRef<Path>>(path: P) -> Result<Vec<Participant>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => FrequenciaError::MissingFile(path.to_path_buf()),
        _ => FrequenciaError::Io(e),
    })?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);
    let mut by_name: BTreeMap<String, Participant> = BTreeMap::new();
    for result in rdr.deserialize() {
        let row: RosterRow = result.map_err(|source| FrequenciaError::CorruptFile {
            path: path.to_path_buf(),
            source,
        })?;
        for (name, slot) in [(clean(row.first), Slot::First), (clean(row.second), Slot::Second)] {
            let Some(name) = name else { continue };
            let entry = by_name.entry(name.clone()).or_insert_with(|| Participant {
                name,
                first_slot: false,
                second_slot: false,
            });
            match slot {
                Slot::First => entry.first_slot = true,
                Slot::Second => entry.second_slot = true,
            }
        }
    }
    Ok(by_name.into_values().collect())
}

/// Participants of one slot, sorted by name.
pub fn slot_members(roster: &[Participant], slot: Slot) -> Vec<&Participant> {
    let mut members: Vec<_> = roster.iter().filter(|p| p.in_slot(slot)).collect();
    members.sort_by(|a, b| a.name.cmp(&b.name));
    members
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn sparse_columns_build_slot_membership() {
        let dir = TempDir::new().unwrap();
        let path = roster_path(dir.path());
        std::fs::write(
            &path,
            "1_momento,2_momento\nCarla,Bruno\nAna,\n,Carla\n , \n",
        )
        .unwrap();

        let roster = load_roster(&path).unwrap();
        assert_eq!(roster.len(), 3);

        let first: Vec<_> = slot_members(&roster, Slot::First)
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(first, ["Ana", "Carla"]);

        let second: Vec<_> = slot_members(&roster, Slot::Second)
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(second, ["Bruno", "Carla"]);
    }

    #[test]
    fn missing_roster_is_reported() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            load_roster(roster_path(dir.path())),
            Err(FrequenciaError::MissingFile(_))
        ));
    }
}
