use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;

use crate::models::ResultRecord;

/// Column preference for the competency rubric. Goals not listed here sort
/// alphabetically after the listed ones.
pub const GOAL_ORDER: &[&str] = &[
    "Plannen",
    "Samenwerken",
    "Communiceren",
    "Reflecteren",
    "Onderzoeken",
    "Presenteren",
];

/// One label as it appears in a cell, with the reviewer tacked on when known.
pub fn cell_label(record: &ResultRecord) -> String {
    match &record.reviewer {
        Some(reviewer) => format!("{} ({})", record.level_label, reviewer),
        None => record.level_label.clone(),
    }
}

/// Union of goal names present in the records, ordered by the preference
/// list with the remainder appended alphabetically. The column set is
/// whatever this export run observed, not a fixed schema.
pub fn ordered_goals(records: &[ResultRecord], preference: &[&str]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for record in records {
        if !names.contains(&record.goal_name) {
            names.push(record.goal_name.clone());
        }
    }

    let rank = |name: &str| {
        preference
            .iter()
            .position(|p| *p == name)
            .unwrap_or(preference.len())
    };
    names.sort_by(|a, b| rank(a).cmp(&rank(b)).then_with(|| a.cmp(b)));
    names
}

/// Pivot the flat records into a semicolon-delimited wide table: one row
/// per student in first-seen order, one column per goal, cells holding
/// every matching label joined by ", " in aggregation order.
pub fn render_csv(records: &[ResultRecord], preference: &[&str]) -> anyhow::Result<Vec<u8>> {
    let goals = ordered_goals(records, preference);

    let mut row_order: Vec<&str> = Vec::new();
    let mut cells: HashMap<(&str, &str), String> = HashMap::new();
    for record in records {
        if !row_order.contains(&record.student_name.as_str()) {
            row_order.push(&record.student_name);
        }
        let cell = cells
            .entry((record.student_name.as_str(), record.goal_name.as_str()))
            .or_default();
        if !cell.is_empty() {
            cell.push_str(", ");
        }
        cell.push_str(&cell_label(record));
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_writer(Vec::new());

    let mut header = vec!["Studentname".to_string()];
    header.extend(goals.iter().cloned());
    writer.write_record(&header)?;

    for student in row_order {
        let mut row = vec![student.to_string()];
        for goal in &goals {
            row.push(
                cells
                    .get(&(student, goal.as_str()))
                    .cloned()
                    .unwrap_or_default(),
            );
        }
        writer.write_record(&row)?;
    }

    writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("failed to flush the csv buffer: {err}"))
}

/// Write the export, overwriting any previous file. The table is rendered
/// fully in memory first and written in one pass, so an aborted run never
/// leaves a truncated file behind. Returns false (and writes nothing)
/// when there are no records.
pub fn export_csv(records: &[ResultRecord], out: &Path, preference: &[&str]) -> anyhow::Result<bool> {
    if records.is_empty() {
        return Ok(false);
    }

    let bytes = render_csv(records, preference)?;
    std::fs::write(out, bytes).with_context(|| format!("failed to write {}", out.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(student: &str, goal: &str, label: &str) -> ResultRecord {
        ResultRecord {
            student_name: student.to_string(),
            goal_name: goal.to_string(),
            level_label: label.to_string(),
            reviewer: None,
        }
    }

    #[test]
    fn listed_goals_come_first_then_alphabetical_remainder() {
        let records = vec![
            record("Fleur", "Reflecteren", "Start"),
            record("Fleur", "Plannen", "Start"),
            record("Fleur", "Unlisted", "Start"),
        ];

        let goals = ordered_goals(&records, GOAL_ORDER);
        assert_eq!(goals, vec!["Plannen", "Reflecteren", "Unlisted"]);
    }

    #[test]
    fn unlisted_goals_sort_alphabetically_among_themselves() {
        let records = vec![
            record("Fleur", "Zelfstandig werken", "Start"),
            record("Fleur", "Argumenteren", "Start"),
            record("Fleur", "Samenwerken", "Start"),
        ];

        let goals = ordered_goals(&records, GOAL_ORDER);
        assert_eq!(
            goals,
            vec!["Samenwerken", "Argumenteren", "Zelfstandig werken"]
        );
    }

    #[test]
    fn repeated_goal_records_concatenate_in_order() {
        let records = vec![
            record("Fleur", "Plannen", "A"),
            record("Fleur", "Plannen", "B"),
        ];

        let bytes = render_csv(&records, GOAL_ORDER).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "Studentname;Plannen\nFleur;A, B\n");
    }

    #[test]
    fn rows_follow_first_seen_student_order() {
        let records = vec![
            record("Noah", "Plannen", "Start"),
            record("Amir", "Plannen", "Start"),
            record("Noah", "Reflecteren", "Expert"),
        ];

        let bytes = render_csv(&records, GOAL_ORDER).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Studentname;Plannen;Reflecteren");
        assert_eq!(lines[1], "Noah;Start;Expert");
        assert_eq!(lines[2], "Amir;Start;");
    }

    #[test]
    fn reviewer_suffix_lands_inside_the_cell() {
        let records = vec![ResultRecord {
            student_name: "Fleur".to_string(),
            goal_name: "Plannen".to_string(),
            level_label: "Gevorderd".to_string(),
            reviewer: Some("Coach Bos".to_string()),
        }];

        let bytes = render_csv(&records, GOAL_ORDER).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("Gevorderd (Coach Bos)"));
    }

    #[test]
    fn empty_record_set_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("results.csv");

        let written = export_csv(&[], &out, GOAL_ORDER).unwrap();
        assert!(!written);
        assert!(!out.exists());
    }

    #[test]
    fn export_overwrites_and_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("results.csv");
        let records = vec![
            record("Fleur", "Plannen", "Start"),
            record("Noah", "Reflecteren", "Expert"),
        ];

        assert!(export_csv(&records, &out, GOAL_ORDER).unwrap());
        let first = std::fs::read(&out).unwrap();
        assert!(export_csv(&records, &out, GOAL_ORDER).unwrap());
        let second = std::fs::read(&out).unwrap();
        assert_eq!(first, second);
    }
}
