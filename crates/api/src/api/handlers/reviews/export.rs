use std::collections::BTreeSet;

use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use hyper::StatusCode;
use serde::Serialize;
use serde_json::json;

use crate::api::handlers::JsonResult;
use crate::api::handlers::reviews::{REVIEW_ROUNDS, round_view};
use crate::api::Context;
use crate::db::models::{ApprovalStatus, Review};

#[derive(Serialize, Debug, PartialEq)]
pub struct ExportSheet {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// Reshape the per-team review rows into one sheet per round: columns are
/// the sorted union of every criterion name seen in that round plus a total
/// column, one row per team that has marks there, missing criterion entries
/// rendered as 0.
pub fn build_sheets(rows: &[(String, Review)]) -> Vec<ExportSheet> {
    (1..=REVIEW_ROUNDS)
        .map(|round| {
            let mut criterion_names = BTreeSet::new();
            let mut included = Vec::new();
            for (team_name, review) in rows {
                let (marks, data) = review.round_columns(round);
                if marks > 0 {
                    let view = round_view(marks, data);
                    for criterion in &view.criteria {
                        if !criterion.name.is_empty() {
                            criterion_names.insert(criterion.name.clone());
                        }
                    }
                    included.push((team_name.clone(), view));
                }
            }

            let names: Vec<String> = criterion_names.into_iter().collect();
            let sheet_rows: Vec<Vec<serde_json::Value>> = included
                .iter()
                .map(|(team_name, view)| {
                    let mut row = vec![json!(team_name)];
                    for name in &names {
                        let marks = view
                            .criteria
                            .iter()
                            .find(|criterion| &criterion.name == name)
                            .map(|criterion| criterion.marks)
                            .unwrap_or(0);
                        row.push(json!(marks));
                    }
                    row.push(json!(view.marks));
                    row
                })
                .collect();

            let mut columns = vec!["Team Name".to_string()];
            columns.extend(names);
            columns.push("Total Marks".to_string());

            ExportSheet {
                title: format!("Review {round}"),
                columns,
                rows: sheet_rows,
            }
        })
        .collect()
}

/// Export of all approved teams' marks, one sheet per round.
pub async fn export_review_marks(ctx: &Context) -> JsonResult {
    ctx.require_admin().await?;

    let rows: Vec<(String, Review)> = crate::db::schema::reviews::table
        .inner_join(crate::db::schema::teams::table)
        .filter(crate::db::schema::teams::approval_status.eq(ApprovalStatus::Approved))
        .order(crate::db::schema::teams::name.asc())
        .select((crate::db::schema::teams::name, Review::as_select()))
        .load(&mut ctx.get_db_conn().await?)
        .await?;

    Ok((StatusCode::OK, json!({ "sheets": build_sheets(&rows) })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn review(marks: [i32; 3], data: [Option<&str>; 3]) -> Review {
        Review {
            id: Uuid::nil(),
            team_id: Uuid::nil(),
            round1_marks: marks[0],
            round2_marks: marks[1],
            round3_marks: marks[2],
            round1_data: data[0].map(str::to_string),
            round2_data: data[1].map(str::to_string),
            round3_data: data[2].map(str::to_string),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_sheets_union_criteria_and_default_missing_to_zero() {
        let rows = vec![
            (
                "Alpha".to_string(),
                review(
                    [50, 0, 0],
                    [
                        Some(r#"{"feedback":"ok","criteria":[{"name":"Design","marks":30},{"name":"Idea","marks":20}]}"#),
                        None,
                        None,
                    ],
                ),
            ),
            (
                "Beta".to_string(),
                review(
                    [40, 0, 0],
                    [
                        Some(r#"{"feedback":"ok","criteria":[{"name":"Idea","marks":40}]}"#),
                        None,
                        None,
                    ],
                ),
            ),
        ];

        let sheets = build_sheets(&rows);
        assert_eq!(sheets.len(), 3);

        let round1 = &sheets[0];
        assert_eq!(round1.title, "Review 1");
        assert_eq!(
            round1.columns,
            vec!["Team Name", "Design", "Idea", "Total Marks"]
        );
        assert_eq!(round1.rows.len(), 2);
        // Beta has no "Design" entry, so it renders as 0.
        assert_eq!(round1.rows[1], vec![json!("Beta"), json!(0), json!(40), json!(40)]);
    }

    #[test]
    fn test_rounds_without_marks_are_excluded() {
        let rows = vec![(
            "Alpha".to_string(),
            review([50, 0, 0], [Some(r#"{"feedback":"ok","criteria":[]}"#), None, None]),
        )];

        let sheets = build_sheets(&rows);
        assert_eq!(sheets[0].rows.len(), 1);
        assert!(sheets[1].rows.is_empty());
        assert!(sheets[2].rows.is_empty());
        assert_eq!(sheets[1].columns, vec!["Team Name", "Total Marks"]);
    }

    #[test]
    fn test_malformed_blob_still_exports_marks() {
        let rows = vec![(
            "Alpha".to_string(),
            review([25, 0, 0], [Some("{broken"), None, None]),
        )];

        let sheets = build_sheets(&rows);
        assert_eq!(sheets[0].rows[0], vec![json!("Alpha"), json!(25)]);
    }
}
