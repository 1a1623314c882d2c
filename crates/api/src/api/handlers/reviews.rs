// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use hyper::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::api::handlers::JsonResult;
use crate::api::{ApiError, Context};
use crate::db::models::{ApprovalStatus, NewReview, Review, Team};

pub mod export;

pub const REVIEW_ROUNDS: i32 = 3;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CriterionScore {
    pub name: String,
    #[serde(default)]
    pub marks: i32,
}

/// Shape of the JSON blob stored per round.
#[derive(Serialize, Deserialize, Debug, Default)]
struct RoundData {
    #[serde(default)]
    feedback: String,
    #[serde(default)]
    criteria: Vec<CriterionScore>,
}

#[derive(Serialize, Debug)]
pub struct RoundView {
    pub marks: i32,
    pub feedback: String,
    pub criteria: Vec<CriterionScore>,
}

/// Reconstruct one round from its marks column and stored blob. An absent
/// or malformed blob degrades to empty feedback and criteria instead of
/// failing the read.
pub fn round_view(marks: i32, data: Option<&str>) -> RoundView {
    let parsed = data
        .and_then(|raw| serde_json::from_str::<RoundData>(raw).ok())
        .unwrap_or_default();
    RoundView {
        marks,
        feedback: parsed.feedback,
        criteria: parsed.criteria,
    }
}

#[derive(Deserialize, Debug)]
pub struct ReviewMarksRequest {
    #[serde(default)]
    pub team_id: Option<Uuid>,
    #[serde(default)]
    pub review_number: Option<i32>,
    #[serde(default)]
    pub marks: Option<i32>,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub criteria: Vec<CriterionScore>,
}

/// Upsert one round of the team's single review row; the other two rounds'
/// columns are left untouched.
pub async fn add_review_marks(ctx: &Context, request: ReviewMarksRequest) -> JsonResult {
    ctx.require_admin().await?;

    let (team_id, round, marks) = match (request.team_id, request.review_number, request.marks) {
        (Some(team_id), Some(round), Some(marks)) => (team_id, round, marks),
        _ => {
            return Err(ApiError::Validation(
                "Team ID, Review Number, and Marks are required".to_string(),
            ));
        }
    };
    if !(1..=REVIEW_ROUNDS).contains(&round) {
        return Err(ApiError::Validation(
            "Review number must be 1, 2, or 3".to_string(),
        ));
    }
    if marks < 0 {
        return Err(ApiError::Validation("Marks must be non-negative".to_string()));
    }
    let feedback = request.feedback.trim().to_string();
    if feedback.is_empty() {
        return Err(ApiError::Validation("Feedback is required".to_string()));
    }

    let mut conn = ctx.get_db_conn().await?;
    let team = crate::db::schema::teams::table
        .find(team_id)
        .select(Team::as_select())
        .first::<Team>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::NotFound("Team not found".to_string()))?;
    if team.approval_status != ApprovalStatus::Approved {
        return Err(ApiError::Forbidden("Team is not approved".to_string()));
    }

    let blob = serde_json::to_string(&RoundData {
        feedback,
        criteria: request.criteria,
    })
    .map_err(|err| ApiError::Internal(format!("failed to serialize review data: {err}")))?;

    use crate::db::schema::reviews;
    let existing = reviews::table
        .filter(reviews::team_id.eq(team_id))
        .select(Review::as_select())
        .first::<Review>(&mut conn)
        .await
        .optional()?;

    let (review, is_update, status) = match existing {
        Some(existing) => {
            let now = chrono::Utc::now();
            let update = reviews::table.find(existing.id);
            let review = match round {
                1 => {
                    diesel::update(update)
                        .set((
                            reviews::round1_marks.eq(marks),
                            reviews::round1_data.eq(Some(blob)),
                            reviews::updated_at.eq(now),
                        ))
                        .get_result::<Review>(&mut conn)
                        .await?
                }
                2 => {
                    diesel::update(update)
                        .set((
                            reviews::round2_marks.eq(marks),
                            reviews::round2_data.eq(Some(blob)),
                            reviews::updated_at.eq(now),
                        ))
                        .get_result::<Review>(&mut conn)
                        .await?
                }
                _ => {
                    diesel::update(update)
                        .set((
                            reviews::round3_marks.eq(marks),
                            reviews::round3_data.eq(Some(blob)),
                            reviews::updated_at.eq(now),
                        ))
                        .get_result::<Review>(&mut conn)
                        .await?
                }
            };
            (review, true, StatusCode::OK)
        }
        None => {
            let mut new_review = NewReview {
                team_id,
                round1_marks: 0,
                round2_marks: 0,
                round3_marks: 0,
                round1_data: None,
                round2_data: None,
                round3_data: None,
            };
            match round {
                1 => {
                    new_review.round1_marks = marks;
                    new_review.round1_data = Some(blob);
                }
                2 => {
                    new_review.round2_marks = marks;
                    new_review.round2_data = Some(blob);
                }
                _ => {
                    new_review.round3_marks = marks;
                    new_review.round3_data = Some(blob);
                }
            }
            let review = diesel::insert_into(reviews::table)
                .values(&new_review)
                .returning(Review::as_returning())
                .get_result::<Review>(&mut conn)
                .await?;
            (review, false, StatusCode::CREATED)
        }
    };

    let (stored_marks, stored_data) = review.round_columns(round);
    let action = if is_update { "updated" } else { "added" };
    Ok((
        status,
        json!({
            "message": format!("Review {round} {action} successfully for team {}", team.name),
            "review": round_view(stored_marks, stored_data),
            "is_update": is_update,
        }),
    ))
}

#[derive(Serialize, Debug)]
pub struct RoundScore {
    pub score: i32,
    pub comment: String,
}

#[derive(Serialize, Debug)]
pub struct LeaderboardEntry {
    pub team_id: Uuid,
    pub team_name: String,
    pub house: String,
    pub rounds: Vec<RoundScore>,
    pub total: i32,
}

/// Aggregate every approved team's rounds; absent rounds count as zero with
/// an empty comment. Sorted by total descending; the sort is stable, so the
/// incoming order decides ties.
pub fn leaderboard_entries(rows: Vec<(Team, Option<Review>)>) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = rows
        .into_iter()
        .map(|(team, review)| {
            let rounds: Vec<RoundScore> = (1..=REVIEW_ROUNDS)
                .map(|round| match &review {
                    Some(review) => {
                        let (marks, data) = review.round_columns(round);
                        let view = round_view(marks, data);
                        RoundScore {
                            score: view.marks,
                            comment: view.feedback,
                        }
                    }
                    None => RoundScore {
                        score: 0,
                        comment: String::new(),
                    },
                })
                .collect();
            let total = rounds.iter().map(|round| round.score).sum();
            LeaderboardEntry {
                team_id: team.id,
                team_name: team.name,
                house: team.house.as_str().to_string(),
                rounds,
                total,
            }
        })
        .collect();
    entries.sort_by(|a, b| b.total.cmp(&a.total));
    entries
}

pub async fn leaderboard(ctx: &Context) -> JsonResult {
    let rows: Vec<(Team, Option<Review>)> = crate::db::schema::teams::table
        .left_join(crate::db::schema::reviews::table)
        .filter(crate::db::schema::teams::approval_status.eq(ApprovalStatus::Approved))
        .order(crate::db::schema::teams::name.asc())
        .select((Team::as_select(), Option::<Review>::as_select()))
        .load(&mut ctx.get_db_conn().await?)
        .await?;

    Ok((
        StatusCode::OK,
        json!({ "leaderboard": leaderboard_entries(rows) }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::House;

    fn review_row(team_id: Uuid, marks: [i32; 3], data: [Option<&str>; 3]) -> Review {
        Review {
            id: Uuid::nil(),
            team_id,
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

    fn team_row(name: &str) -> Team {
        Team {
            id: Uuid::now_v7(),
            name: name.to_string(),
            house: House::Ravenclaw,
            team_size: 1,
            utr_transaction_id: "UTR1".to_string(),
            payment_proof_path: None,
            approval_status: ApprovalStatus::Approved,
            selected_problem_statement_id: None,
            git_repo_url: None,
            registered_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_round_view_parses_stored_blob() {
        let blob = r#"{"feedback":"Great start","criteria":[{"name":"Design","marks":40}]}"#;
        let view = round_view(85, Some(blob));
        assert_eq!(view.marks, 85);
        assert_eq!(view.feedback, "Great start");
        assert_eq!(view.criteria.len(), 1);
        assert_eq!(view.criteria[0].name, "Design");
    }

    #[test]
    fn test_round_view_degrades_on_missing_or_malformed_blob() {
        let empty = round_view(10, None);
        assert_eq!(empty.marks, 10);
        assert_eq!(empty.feedback, "");
        assert!(empty.criteria.is_empty());

        let broken = round_view(10, Some("{not json"));
        assert_eq!(broken.marks, 10);
        assert_eq!(broken.feedback, "");
        assert!(broken.criteria.is_empty());
    }

    #[test]
    fn test_leaderboard_defaults_and_totals() {
        let scored = team_row("Scored");
        let unscored = team_row("Unscored");
        let review = review_row(
            scored.id,
            [85, 0, 0],
            [Some(r#"{"feedback":"Great start","criteria":[]}"#), None, None],
        );

        let entries = leaderboard_entries(vec![
            (unscored.clone(), None),
            (scored.clone(), Some(review)),
        ]);

        assert_eq!(entries[0].team_name, "Scored");
        assert_eq!(entries[0].total, 85);
        assert_eq!(entries[0].rounds[0].comment, "Great start");
        assert_eq!(entries[0].rounds[1].score, 0);
        assert_eq!(entries[0].rounds[2].score, 0);

        assert_eq!(entries[1].team_name, "Unscored");
        assert_eq!(entries[1].total, 0);
        assert_eq!(entries[1].rounds.len(), 3);
    }

    #[test]
    fn test_leaderboard_sorts_by_total_descending() {
        let low = team_row("Low");
        let high = team_row("High");
        let low_review = review_row(low.id, [10, 0, 0], [None, None, None]);
        let high_review = review_row(high.id, [30, 20, 10], [None, None, None]);

        let entries = leaderboard_entries(vec![
            (low, Some(low_review)),
            (high, Some(high_review)),
        ]);
        assert_eq!(entries[0].team_name, "High");
        assert_eq!(entries[0].total, 60);
        assert_eq!(entries[1].team_name, "Low");
    }
}
