use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::client::{ApiClient, FetchError, FetchResult};
use crate::models::{FeedbackItem, Goal, RosterRow, Section, ShareRecord, StudentIndex};

/// Page size for the regular collection endpoints.
pub const PER_PAGE: usize = 200;
/// The sections endpoint does not accept `per_page` and serves fixed pages.
pub const SECTIONS_PAGE_SIZE: usize = 10;

/// Decode raw page items, dropping records that do not match the expected
/// shape. Sparse or malformed feedback graphs are normal in this domain.
fn decode_items<T: DeserializeOwned>(items: Vec<Value>) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                tracing::debug!("dropping malformed record: {err}");
                None
            }
        })
        .collect()
}

/// Students who shared a collection with the current viewer, newest share
/// first. Only inviters acting in the student role count; coaches and
/// peers sharing collections are discarded.
pub async fn fetch_shared_students(client: &ApiClient) -> FetchResult<StudentIndex> {
    let items = client
        .get_paginated(
            "shares/shared-with-me",
            PER_PAGE,
            true,
            &[
                ("order_by", "created_at".to_string()),
                ("order_direction", "desc".to_string()),
            ],
            None,
        )
        .await?;

    let mut students = StudentIndex::default();
    for share in decode_items::<ShareRecord>(items) {
        let Some(inviter) = share.inviter else {
            continue;
        };
        if inviter.current_role != "student" {
            continue;
        }
        let Some(portfolio_id) = share.portfolio_id else {
            continue;
        };
        students.observe(inviter.id, &inviter.name, Some(portfolio_id), true);
    }

    Ok(students)
}

pub async fn fetch_sections(client: &ApiClient) -> FetchResult<Vec<Section>> {
    let items = client
        .get_paginated("lms/sections", SECTIONS_PAGE_SIZE, false, &[], None)
        .await?;
    Ok(decode_items(items))
}

/// Roster of one section. Students whose share type is absent or "none"
/// never granted portfolio access; they stay in the roster for visibility
/// and are expected to yield zero evaluations downstream.
pub async fn fetch_roster(client: &ApiClient, section_id: i64) -> FetchResult<StudentIndex> {
    let items = client
        .get_paginated(
            "dashboard",
            PER_PAGE,
            true,
            &[("section_id", section_id.to_string())],
            Some("students"),
        )
        .await?;

    let mut students = StudentIndex::default();
    for row in decode_items::<RosterRow>(items) {
        let has_access = row.share_type.as_deref().is_some_and(|t| t != "none");
        students.observe(row.id, &row.name, row.portfolio_id, has_access);
    }

    Ok(students)
}

/// Goals of one portfolio. Goal sets differ per portfolio, so this is
/// never cached. A single page in practice, paginated anyway.
pub async fn fetch_goals(client: &ApiClient, portfolio_id: i64) -> FetchResult<Vec<Goal>> {
    let path = format!("portfolios/{portfolio_id}/goals");
    let items = client.get_paginated(&path, PER_PAGE, true, &[], None).await?;
    Ok(decode_items(items))
}

/// Feedback items for one (portfolio, goal) pair. Some portfolios are
/// legitimately invisible to the viewer: a 404 here means "no accessible
/// data", not a failure.
pub async fn fetch_feedback(
    client: &ApiClient,
    portfolio_id: i64,
    goal_id: i64,
) -> FetchResult<Vec<FeedbackItem>> {
    let path = format!("portfolios/{portfolio_id}/goals/{goal_id}/feedback-items");
    match client.get_paginated(&path, PER_PAGE, true, &[], None).await {
        Ok(items) => Ok(decode_items(items)),
        Err(FetchError::NotFound) => {
            tracing::info!(portfolio_id, goal_id, "no access to feedback, skipping");
            Ok(Vec::new())
        }
        Err(err) => Err(err),
    }
}
