use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};

use crate::model::{AttendanceRecord, PresenceMode, Slot};

/// Which ledger rows an aggregate covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Only rows whose date was a sanctioned meeting day.
    ValidOnly,
    /// Every row of one calendar year, valid or not.
    Year(i32),
}

impl Scope {
    pub fn includes(self, record: &AttendanceRecord) -> bool {
        match self {
            Scope::ValidOnly => record.date_valid,
            Scope::Year(year) => record.date.year() == year,
        }
    }
}

/// Rounds to `decimals` places, ties to even (6.25 -> 6.2).
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

fn percent(part: usize, total: usize, decimals: i32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round_to(part as f64 / total as f64 * 100.0, decimals)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl std::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}/{}", self.month, self.year)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyPresence {
    pub month: YearMonth,
    pub slot: Slot,
    pub total: usize,
    pub present: usize,
    pub present_pct: f64,
    pub absent_pct: f64,
}

/// Presence percentage per (month, slot), ordered by month then slot.
pub fn monthly_presence(records: &[AttendanceRecord], scope: Scope) -> Vec<MonthlyPresence> {
    let mut groups: BTreeMap<(YearMonth, Slot), (usize, usize)> = BTreeMap::new();
    for record in records.iter().filter(|r| scope.includes(r)) {
        let entry = groups
            .entry((YearMonth::of(record.date), record.slot))
            .or_insert((0, 0));
        entry.0 += 1;
        if record.presence.is_present() {
            entry.1 += 1;
        }
    }
    groups
        .into_iter()
        .map(|((month, slot), (total, present))| {
            let present_pct = percent(present, total, 1);
            MonthlyPresence {
                month,
                slot,
                total,
                present,
                present_pct,
                absent_pct: round_to(100.0 - present_pct, 1),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModeShare {
    pub mode: PresenceMode,
    pub count: usize,
    pub pct: f64,
}

/// Share of each presence mode within the scoped rows. Modes that never occur
/// are left out.
pub fn mode_distribution(records: &[AttendanceRecord], scope: Scope) -> Vec<ModeShare> {
    let scoped: Vec<_> = records.iter().filter(|r| scope.includes(r)).collect();
    PresenceMode::ALL
        .iter()
        .filter_map(|mode| {
            let count = scoped
                .iter()
                .filter(|r| r.presence.mode() == *mode)
                .count();
            (count > 0).then(|| ModeShare {
                mode: *mode,
                count,
                pct: percent(count, scoped.len(), 2),
            })
        })
        .collect()
}

/// Drill-down filter for one person. Bounds are inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersonFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub slot: Option<Slot>,
}

impl PersonFilter {
    fn matches(&self, record: &AttendanceRecord) -> bool {
        self.from.is_none_or(|from| record.date >= from)
            && self.to.is_none_or(|to| record.date <= to)
            && self.slot.is_none_or(|slot| record.slot == slot)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersonMonth {
    pub month: YearMonth,
    pub total: usize,
    pub present: usize,
    pub present_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersonSummary {
    pub name: String,
    pub total: usize,
    pub present: usize,
    pub on_site: usize,
    pub remote: usize,
    pub present_pct: f64,
    pub absent_pct: f64,
    pub on_site_pct: f64,
    pub remote_pct: f64,
    pub months: Vec<PersonMonth>,
}

pub fn person_summary(
    records: &[AttendanceRecord],
    name: &str,
    scope: Scope,
    filter: &PersonFilter,
) -> PersonSummary {
    let rows: Vec<_> = records
        .iter()
        .filter(|r| r.name == name && scope.includes(r) && filter.matches(r))
        .collect();
    let total = rows.len();
    let count_mode = |mode| rows.iter().filter(|r| r.presence.mode() == mode).count();
    let on_site = count_mode(PresenceMode::OnSite);
    let remote = count_mode(PresenceMode::Remote);
    let present = on_site + remote;

    let mut by_month: BTreeMap<YearMonth, (usize, usize)> = BTreeMap::new();
    for r in &rows {
        let entry = by_month.entry(YearMonth::of(r.date)).or_insert((0, 0));
        entry.0 += 1;
        if r.presence.is_present() {
            entry.1 += 1;
        }
    }

    let present_pct = percent(present, total, 2);
    PersonSummary {
        name: name.to_string(),
        total,
        present,
        on_site,
        remote,
        present_pct,
        absent_pct: if total == 0 {
            0.0
        } else {
            round_to(100.0 - present_pct, 2)
        },
        on_site_pct: percent(on_site, total, 2),
        remote_pct: percent(remote, total, 2),
        months: by_month
            .into_iter()
            .map(|(month, (total, present))| PersonMonth {
                month,
                total,
                present,
                present_pct: percent(present, total, 2),
            })
            .collect(),
    }
}

/// Distinct participant names found in the ledger, sorted.
pub fn participants(records: &[AttendanceRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.name.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttendMode, Presence};

    fn rec(
        name: &str,
        date: (i32, u32, u32),
        slot: Slot,
        presence: Presence,
        valid: bool,
    ) -> AttendanceRecord {
        AttendanceRecord {
            name: name.to_string(),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            slot,
            presence,
            date_valid: valid,
        }
    }

    const ON_SITE: Presence = Presence::Present(AttendMode::OnSite);
    const REMOTE: Presence = Presence::Present(AttendMode::Remote);

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn monthly_percentage_rounds_to_one_decimal() {
        let records = vec![
            rec("Ana", (2025, 1, 6), Slot::First, ON_SITE, true),
            rec("Bia", (2025, 1, 6), Slot::First, REMOTE, true),
            rec("Caio", (2025, 1, 6), Slot::First, Presence::Absent, true),
        ];
        let monthly = monthly_presence(&records, Scope::ValidOnly);
        assert_eq!(monthly.len(), 1);
        assert_eq!(monthly[0].total, 3);
        assert_eq!(monthly[0].present, 2);
        assert_close(monthly[0].present_pct, 66.7);
        assert_close(monthly[0].absent_pct, 33.3);
    }

    #[test]
    fn monthly_ties_round_to_even() {
        let mut records: Vec<_> = (0..15)
            .map(|_| rec("Ana", (2025, 1, 6), Slot::First, Presence::Absent, true))
            .collect();
        records.push(rec("Bia", (2025, 1, 6), Slot::First, ON_SITE, true));
        let monthly = monthly_presence(&records, Scope::ValidOnly);
        assert_close(monthly[0].present_pct, 6.2);
        assert_close(monthly[0].absent_pct, 93.8);
    }

    #[test]
    fn monthly_groups_by_month_and_slot_and_respects_scope() {
        let records = vec![
            rec("Ana", (2025, 1, 6), Slot::First, ON_SITE, true),
            rec("Ana", (2025, 1, 6), Slot::Second, Presence::Absent, true),
            rec("Ana", (2025, 2, 3), Slot::First, Presence::Absent, true),
            rec("Ana", (2025, 2, 4), Slot::First, ON_SITE, false),
            rec("Ana", (2024, 12, 30), Slot::First, ON_SITE, true),
        ];

        let valid = monthly_presence(&records, Scope::ValidOnly);
        let keys: Vec<_> = valid.iter().map(|m| (m.month.to_string(), m.slot)).collect();
        assert_eq!(
            keys,
            [
                ("12/2024".to_string(), Slot::First),
                ("01/2025".to_string(), Slot::First),
                ("01/2025".to_string(), Slot::Second),
                ("02/2025".to_string(), Slot::First),
            ]
        );
        assert_close(valid[3].present_pct, 0.0);
        assert_close(valid[3].absent_pct, 100.0);

        let year = monthly_presence(&records, Scope::Year(2025));
        assert_eq!(year.len(), 3);
        let february = &year[2];
        assert_eq!((february.total, february.present), (2, 1));
        assert_close(february.present_pct, 50.0);
    }

    #[test]
    fn mode_distribution_sums_over_scope() {
        let records = vec![
            rec("Ana", (2025, 1, 6), Slot::First, ON_SITE, true),
            rec("Bia", (2025, 1, 6), Slot::First, ON_SITE, true),
            rec("Caio", (2025, 1, 6), Slot::First, REMOTE, true),
            rec("Davi", (2025, 1, 7), Slot::First, Presence::Absent, false),
        ];
        let shares = mode_distribution(&records, Scope::ValidOnly);
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].mode, PresenceMode::OnSite);
        assert_close(shares[0].pct, 66.67);
        assert_close(shares[1].pct, 33.33);

        assert_eq!(mode_distribution(&records, Scope::Year(2025)).len(), 3);
        assert!(mode_distribution(&[], Scope::ValidOnly).is_empty());
    }

    #[test]
    fn person_summary_applies_filter() {
        let records = vec![
            rec("Ana", (2025, 1, 6), Slot::First, ON_SITE, true),
            rec("Ana", (2025, 1, 13), Slot::First, REMOTE, true),
            rec("Ana", (2025, 1, 20), Slot::Second, Presence::Absent, true),
            rec("Ana", (2025, 2, 3), Slot::First, Presence::Absent, true),
            rec("Bia", (2025, 1, 6), Slot::First, ON_SITE, true),
        ];

        let all = person_summary(&records, "Ana", Scope::ValidOnly, &PersonFilter::default());
        assert_eq!((all.total, all.present, all.on_site, all.remote), (4, 2, 1, 1));
        assert_close(all.present_pct, 50.0);
        assert_close(all.on_site_pct, 25.0);
        assert_eq!(all.months.len(), 2);
        assert_close(all.months[0].present_pct, 66.67);

        let january_first_slot = PersonFilter {
            from: NaiveDate::from_ymd_opt(2025, 1, 1),
            to: NaiveDate::from_ymd_opt(2025, 1, 31),
            slot: Some(Slot::First),
        };
        let filtered = person_summary(&records, "Ana", Scope::ValidOnly, &january_first_slot);
        assert_eq!((filtered.total, filtered.present), (2, 2));
        assert_close(filtered.absent_pct, 0.0);

        let nobody = person_summary(&records, "Zé", Scope::ValidOnly, &PersonFilter::default());
        assert_eq!(nobody.total, 0);
        assert_close(nobody.present_pct, 0.0);
        assert_close(nobody.absent_pct, 0.0);
    }

    #[test]
    fn participants_are_distinct_and_sorted() {
        let records = vec![
            rec("Bia", (2025, 1, 6), Slot::First, ON_SITE, true),
            rec("Ana", (2025, 1, 6), Slot::First, ON_SITE, true),
            rec("Bia", (2025, 1, 13), Slot::First, ON_SITE, true),
        ];
        assert_eq!(participants(&records), ["Ana", "Bia"]);
    }
}
