use std::collections::BTreeSet;

use serde::Deserialize;

/// Raw share record from `shares/shared-with-me`.
#[derive(Debug, Deserialize)]
pub struct ShareRecord {
    pub inviter: Option<Inviter>,
    pub portfolio_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct Inviter {
    pub id: i64,
    pub name: String,
    pub current_role: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Section {
    pub id: i64,
    pub name: String,
}

/// Sections follow a naming convention: coaching groups and guilds carry a
/// fixed name prefix, everything else is miscellaneous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Coaching,
    Guild,
    Other,
}

impl Section {
    pub fn kind(&self) -> SectionKind {
        if self.name.starts_with("Coach ") {
            SectionKind::Coaching
        } else if self.name.starts_with("Gilde ") {
            SectionKind::Guild
        } else {
            SectionKind::Other
        }
    }
}

/// Raw per-student row from the dashboard roster.
#[derive(Debug, Deserialize)]
pub struct RosterRow {
    pub id: i64,
    pub name: String,
    pub portfolio_id: Option<i64>,
    pub share_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Goal {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackItem {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub role: Option<String>,
    pub evaluation: Option<Evaluation>,
}

/// A scored criterion. The selected level id resolves against the
/// evaluation's own level set, never a separate catalog.
#[derive(Debug, Deserialize)]
pub struct Evaluation {
    pub level: Option<i64>,
    #[serde(default)]
    pub level_set: Vec<Level>,
    pub reviewer: Option<Reviewer>,
}

#[derive(Debug, Deserialize)]
pub struct Level {
    pub id: i64,
    pub label: String,
}

#[derive(Debug, Deserialize)]
pub struct Reviewer {
    pub name: String,
}

/// A student as assembled from share or roster observations. A student can
/// hold several portfolios across enrollments; the set stays deduplicated.
#[derive(Debug, Clone)]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub portfolio_ids: BTreeSet<i64>,
    pub has_access: bool,
}

/// Students keyed by display name, preserving first-seen order. Display
/// names are assumed unique within a run; duplicate observations merge
/// their portfolio ids into the existing entry.
#[derive(Debug, Default)]
pub struct StudentIndex {
    students: Vec<Student>,
}

impl StudentIndex {
    pub fn observe(&mut self, id: i64, name: &str, portfolio_id: Option<i64>, has_access: bool) {
        match self.students.iter_mut().find(|s| s.name == name) {
            Some(existing) => {
                existing.portfolio_ids.extend(portfolio_id);
                existing.has_access |= has_access;
            }
            None => self.students.push(Student {
                id,
                name: name.to_string(),
                portfolio_ids: portfolio_id.into_iter().collect(),
                has_access,
            }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Student> {
        self.students.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }
}

/// Flat evaluation row: the unit the aggregator emits and the exporter
/// consumes. Several records may share a (student, goal) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub student_name: String,
    pub goal_name: String,
    pub level_label: String,
    pub reviewer: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_kind_follows_name_prefix() {
        let coach = Section {
            id: 1,
            name: "Coach Jansen".to_string(),
        };
        let guild = Section {
            id: 2,
            name: "Gilde Techniek".to_string(),
        };
        let plain = Section {
            id: 3,
            name: "Leerjaar 2".to_string(),
        };

        assert_eq!(coach.kind(), SectionKind::Coaching);
        assert_eq!(guild.kind(), SectionKind::Guild);
        assert_eq!(plain.kind(), SectionKind::Other);
    }

    #[test]
    fn duplicate_observations_merge_portfolio_ids() {
        let mut index = StudentIndex::default();
        index.observe(7, "Fleur de Vries", Some(100), true);
        index.observe(7, "Fleur de Vries", Some(101), true);
        index.observe(7, "Fleur de Vries", Some(100), true);

        assert_eq!(index.len(), 1);
        let student = index.get("Fleur de Vries").unwrap();
        assert_eq!(
            student.portfolio_ids.iter().copied().collect::<Vec<_>>(),
            vec![100, 101]
        );
    }

    #[test]
    fn first_seen_order_is_preserved() {
        let mut index = StudentIndex::default();
        index.observe(1, "Noah", Some(10), true);
        index.observe(2, "Amir", Some(11), true);
        index.observe(1, "Noah", Some(12), true);

        let names: Vec<&str> = index.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Noah", "Amir"]);
    }

    #[test]
    fn access_flag_sticks_once_granted() {
        let mut index = StudentIndex::default();
        index.observe(1, "Sam", None, false);
        index.observe(1, "Sam", Some(10), true);

        assert!(index.get("Sam").unwrap().has_access);
    }
}
