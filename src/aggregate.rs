use crate::api;
use crate::client::{ApiClient, FetchError};
use crate::models::{Evaluation, ResultRecord, Student};

/// The bearer token expired somewhere inside a collection walk. The whole
/// walk for that student is abandoned; the caller decides how to recover.
#[derive(Debug, PartialEq, Eq)]
pub struct SessionExpired;

/// Resolve an evaluation's selected level id against its own level set.
/// A missing id or a level set without a matching entry yields `None`.
pub fn resolve_level(evaluation: &Evaluation) -> Option<&str> {
    let level_id = evaluation.level?;
    evaluation
        .level_set
        .iter()
        .find(|level| level.id == level_id)
        .map(|level| level.label.as_str())
}

/// Walk every portfolio of one student: portfolios -> goals -> feedback
/// items, keeping peer criterion evaluations whose level resolves. An
/// unreadable portfolio or goal is skipped with a warning; only token
/// expiry aborts the walk.
pub async fn collect_results(
    client: &ApiClient,
    student: &Student,
    include_reviewer: bool,
) -> Result<Vec<ResultRecord>, SessionExpired> {
    let mut results = Vec::new();
    tracing::debug!(student_id = student.id, student = %student.name, "collecting evaluations");

    for &portfolio_id in &student.portfolio_ids {
        let goals = match api::fetch_goals(client, portfolio_id).await {
            Ok(goals) => goals,
            Err(FetchError::AuthExpired) => return Err(SessionExpired),
            Err(_) => {
                tracing::warn!(
                    portfolio_id,
                    student = %student.name,
                    "portfolio goals unavailable, skipping portfolio"
                );
                continue;
            }
        };

        for goal in goals {
            let items = match api::fetch_feedback(client, portfolio_id, goal.id).await {
                Ok(items) => items,
                Err(FetchError::AuthExpired) => return Err(SessionExpired),
                Err(_) => {
                    tracing::warn!(
                        portfolio_id,
                        goal = %goal.name,
                        "feedback unavailable, skipping goal"
                    );
                    continue;
                }
            };

            for item in items {
                if item.kind.as_deref() != Some("criterion_evaluation") {
                    continue;
                }
                if item.role.as_deref() == Some("self") {
                    continue;
                }
                let Some(evaluation) = item.evaluation else {
                    continue;
                };
                let Some(label) = resolve_level(&evaluation) else {
                    continue;
                };

                let reviewer = if include_reviewer {
                    evaluation.reviewer.as_ref().map(|r| r.name.clone())
                } else {
                    None
                };

                results.push(ResultRecord {
                    student_name: student.name.clone(),
                    goal_name: goal.name.clone(),
                    level_label: label.to_string(),
                    reviewer,
                });
            }
        }
    }

    Ok(results)
}
