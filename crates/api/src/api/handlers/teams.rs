// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use hyper::StatusCode;
use serde_json::json;
use uuid::Uuid;

use crate::api::handlers::JsonResult;
use crate::api::handlers::settings::{TEAMS_ENABLED, setting_enabled};
use crate::api::{ApiError, Context};
use crate::db::models::{ApprovalStatus, House, Member, Team};

pub fn member_json(member: &Member) -> serde_json::Value {
    json!({
        "id": member.id,
        "name": member.name,
        "email": member.email,
        "phone": member.phone,
        "college": member.college,
        "is_leader": member.is_leader,
        "position": member.position,
    })
}

pub fn team_detail_json(team: &Team, members: &[Member]) -> serde_json::Value {
    json!({
        "id": team.id,
        "team_name": team.name,
        "house": team.house.as_str(),
        "team_size": team.team_size,
        "registered_at": team.registered_at.to_rfc3339(),
        "approval_status": team.approval_status,
        "utr_transaction_id": team.utr_transaction_id,
        "payment_proof_path": team.payment_proof_path,
        "selected_problem_statement_id": team.selected_problem_statement_id,
        "git_repo_url": team.git_repo_url.as_deref().unwrap_or(""),
        "members": members.iter().map(member_json).collect::<Vec<_>>(),
    })
}

/// Compact listing representation: member names only, college taken from
/// the first (leader) member.
pub fn team_summary_json(team: &Team, members: &[Member]) -> serde_json::Value {
    json!({
        "id": team.id,
        "name": team.name,
        "house": team.house.as_str(),
        "members": members.iter().map(|member| member.name.clone()).collect::<Vec<_>>(),
        "projectUrl": team.git_repo_url.as_deref().unwrap_or(""),
        "college": members.first().map(|member| member.college.clone()).unwrap_or_default(),
        "description": format!("A brave team from {} house", team.house.as_str()),
        "approval_status": team.approval_status,
    })
}

async fn members_for_teams(
    ctx: &Context,
    teams: &[Team],
) -> Result<Vec<Vec<Member>>, ApiError> {
    let grouped = Member::belonging_to(teams)
        .order(crate::db::schema::members::position.asc())
        .load::<Member>(&mut ctx.get_db_conn().await?)
        .await?
        .grouped_by(teams);
    Ok(grouped)
}

/// Public team listing with optional house and name-search filters.
pub async fn list_teams(
    ctx: &Context,
    house_filter: Option<String>,
    search: Option<String>,
) -> JsonResult {
    if !setting_enabled(ctx, TEAMS_ENABLED).await? {
        return Err(ApiError::FeatureDisabled(
            "The team listing is currently disabled".to_string(),
        ));
    }

    use crate::db::schema::teams::dsl::*;

    let mut query = teams
        .select(Team::as_select())
        .order(registered_at.desc())
        .into_boxed();
    if let Some(wanted) = house_filter.as_deref().and_then(House::parse) {
        query = query.filter(house.eq(wanted));
    }
    if let Some(term) = search.as_deref().map(str::trim).filter(|term| !term.is_empty()) {
        query = query.filter(name.ilike(format!("%{term}%")));
    }

    let team_records = query
        .load::<Team>(&mut ctx.get_db_conn().await?)
        .await?;
    let member_groups = members_for_teams(ctx, &team_records).await?;

    let summaries: Vec<_> = team_records
        .iter()
        .zip(&member_groups)
        .map(|(team, members)| team_summary_json(team, members))
        .collect();

    Ok((StatusCode::OK, json!({ "teams": summaries })))
}

pub async fn get_team(ctx: &Context, team_id: Uuid) -> JsonResult {
    let team = crate::db::schema::teams::table
        .find(team_id)
        .select(Team::as_select())
        .first::<Team>(&mut ctx.get_db_conn().await?)
        .await
        .optional()?
        .ok_or_else(|| ApiError::NotFound("Team not found".to_string()))?;

    let members = crate::db::schema::members::table
        .filter(crate::db::schema::members::team_id.eq(team.id))
        .order(crate::db::schema::members::position.asc())
        .load::<Member>(&mut ctx.get_db_conn().await?)
        .await?;

    Ok((StatusCode::OK, json!({ "team": team_detail_json(&team, &members) })))
}

/// Teams awaiting an approval decision, newest first.
pub async fn pending_teams(ctx: &Context) -> JsonResult {
    ctx.require_admin().await?;

    let team_records = crate::db::schema::teams::table
        .filter(crate::db::schema::teams::approval_status.eq(ApprovalStatus::Pending))
        .order(crate::db::schema::teams::registered_at.desc())
        .select(Team::as_select())
        .load::<Team>(&mut ctx.get_db_conn().await?)
        .await?;
    let member_groups = members_for_teams(ctx, &team_records).await?;

    let details: Vec<_> = team_records
        .iter()
        .zip(&member_groups)
        .map(|(team, members)| team_detail_json(team, members))
        .collect();

    Ok((StatusCode::OK, json!({ "teams": details })))
}

/// Approved team id/name/house triples, used by the review dropdowns.
pub async fn approved_team_names(ctx: &Context) -> JsonResult {
    ctx.require_admin().await?;

    use crate::db::schema::teams::dsl::*;
    let team_records = teams
        .filter(approval_status.eq(ApprovalStatus::Approved))
        .order(name.asc())
        .select(Team::as_select())
        .load::<Team>(&mut ctx.get_db_conn().await?)
        .await?;

    let entries: Vec<_> = team_records
        .iter()
        .map(|team| {
            json!({
                "id": team.id,
                "team_name": team.name,
                "house": team.house.as_str(),
            })
        })
        .collect();

    Ok((StatusCode::OK, json!({ "teams": entries })))
}

/// Approved teams with full member detail, for the management view.
pub async fn all_teams_with_members(ctx: &Context) -> JsonResult {
    ctx.require_admin().await?;

    let team_records = crate::db::schema::teams::table
        .filter(crate::db::schema::teams::approval_status.eq(ApprovalStatus::Approved))
        .order(crate::db::schema::teams::name.asc())
        .select(Team::as_select())
        .load::<Team>(&mut ctx.get_db_conn().await?)
        .await?;
    let member_groups = members_for_teams(ctx, &team_records).await?;

    let details: Vec<_> = team_records
        .iter()
        .zip(&member_groups)
        .map(|(team, members)| team_detail_json(team, members))
        .collect();

    Ok((StatusCode::OK, json!({ "teams": details })))
}

pub async fn statistics(ctx: &Context) -> JsonResult {
    ctx.require_admin().await?;

    let total_members: i64 = crate::db::schema::members::table
        .count()
        .get_result(&mut ctx.get_db_conn().await?)
        .await?;
    let total_teams: i64 = crate::db::schema::teams::table
        .count()
        .get_result(&mut ctx.get_db_conn().await?)
        .await?;

    let mut by_house = serde_json::Map::new();
    for house_kind in House::ALL {
        let count: i64 = crate::db::schema::teams::table
            .filter(crate::db::schema::teams::house.eq(house_kind))
            .count()
            .get_result(&mut ctx.get_db_conn().await?)
            .await?;
        by_house.insert(house_kind.as_str().to_lowercase(), json!(count));
    }

    Ok((
        StatusCode::OK,
        json!({
            "statistics": {
                "total_members": total_members,
                "total_teams": total_teams,
                "by_domain": by_house,
            }
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_team() -> Team {
        Team {
            id: Uuid::nil(),
            name: "Dumbledore's Army".to_string(),
            house: House::Gryffindor,
            team_size: 2,
            utr_transaction_id: "UTR42".to_string(),
            payment_proof_path: None,
            approval_status: ApprovalStatus::Pending,
            selected_problem_statement_id: None,
            git_repo_url: None,
            registered_at: chrono::Utc::now(),
        }
    }

    fn sample_member(name: &str, position: i32, is_leader: bool) -> Member {
        Member {
            id: Uuid::nil(),
            team_id: Uuid::nil(),
            name: name.to_string(),
            email: format!("{}@hogwarts.example", position),
            phone: "1234567890".to_string(),
            college: "Hogwarts".to_string(),
            is_leader,
            position,
        }
    }

    #[test]
    fn test_team_summary_uses_leader_college_and_member_names() {
        let team = sample_team();
        let members = vec![
            sample_member("Harry", 1, true),
            sample_member("Hermione", 2, false),
        ];
        let summary = team_summary_json(&team, &members);
        assert_eq!(summary["college"], "Hogwarts");
        assert_eq!(summary["members"], json!(["Harry", "Hermione"]));
        assert_eq!(summary["house"], "Gryffindor");
        assert_eq!(summary["approval_status"], "pending");
    }

    #[test]
    fn test_team_detail_defaults_missing_repo_url_to_empty() {
        let team = sample_team();
        let detail = team_detail_json(&team, &[]);
        assert_eq!(detail["git_repo_url"], "");
        assert_eq!(detail["team_name"], "Dumbledore's Army");
    }
}
