// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use hyper::StatusCode;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::api::handlers::JsonResult;
use crate::api::handlers::teams::team_summary_json;
use crate::api::{ApiError, Context};
use crate::db::models::{
    ApprovalStatus, Difficulty, House, Member, NewProblemStatement, ProblemStatement, Team,
};

pub fn statement_json(statement: &ProblemStatement) -> serde_json::Value {
    json!({
        "id": statement.id,
        "title": statement.title,
        "description": statement.description,
        "domain": statement.domain.as_str(),
        "difficulty": statement.difficulty,
        "house": statement.house.map(|house| house.as_str()),
        "created_at": statement.created_at.to_rfc3339(),
    })
}

#[derive(Deserialize, Debug)]
pub struct CreateStatementRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub house: Option<String>,
}

pub async fn create_statement(ctx: &Context, request: CreateStatementRequest) -> JsonResult {
    ctx.require_admin().await?;

    let title = request.title.trim().to_string();
    let description = request.description.trim().to_string();
    if title.is_empty()
        || description.is_empty()
        || request.domain.trim().is_empty()
        || request.difficulty.trim().is_empty()
    {
        return Err(ApiError::Validation("All fields are required".to_string()));
    }
    let domain = House::parse(&request.domain)
        .ok_or_else(|| ApiError::Validation("Invalid domain".to_string()))?;
    let difficulty = Difficulty::parse(&request.difficulty)
        .ok_or_else(|| ApiError::Validation("Invalid difficulty".to_string()))?;
    let house = match request.house.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(
            House::parse(raw).ok_or_else(|| ApiError::Validation("Invalid house".to_string()))?,
        ),
        _ => None,
    };

    let statement = diesel::insert_into(crate::db::schema::problem_statements::table)
        .values(NewProblemStatement {
            title,
            description,
            domain,
            difficulty,
            house,
        })
        .returning(ProblemStatement::as_returning())
        .get_result::<ProblemStatement>(&mut ctx.get_db_conn().await?)
        .await?;

    Ok((
        StatusCode::CREATED,
        json!({
            "message": "Problem statement added successfully",
            "statement": statement_json(&statement),
        }),
    ))
}

pub async fn delete_statement(ctx: &Context, statement_id: Uuid) -> JsonResult {
    ctx.require_admin().await?;

    let deleted = diesel::delete(
        crate::db::schema::problem_statements::table.find(statement_id),
    )
    .execute(&mut ctx.get_db_conn().await?)
    .await?;
    if deleted == 0 {
        return Err(ApiError::NotFound("Problem statement not found".to_string()));
    }

    Ok((
        StatusCode::OK,
        json!({ "message": "Problem statement deleted successfully" }),
    ))
}

/// Listing with optional house and domain filters; a house filter also
/// matches statements open to all houses. Each statement carries the number
/// of teams that selected it.
pub async fn list_statements(
    ctx: &Context,
    house_filter: Option<String>,
    domain_filter: Option<String>,
) -> JsonResult {
    use crate::db::schema::problem_statements::dsl::*;

    let mut query = problem_statements
        .select(ProblemStatement::as_select())
        .order(created_at.desc())
        .into_boxed();
    if let Some(wanted) = house_filter.as_deref().and_then(House::parse) {
        query = query.filter(house.eq(wanted).or(house.is_null()));
    }
    if let Some(wanted) = domain_filter.as_deref().and_then(House::parse) {
        query = query.filter(domain.eq(wanted));
    }

    let statements = query
        .load::<ProblemStatement>(&mut ctx.get_db_conn().await?)
        .await?;

    let mut entries = Vec::with_capacity(statements.len());
    for statement in &statements {
        let selected_count: i64 = crate::db::schema::teams::table
            .filter(crate::db::schema::teams::selected_problem_statement_id.eq(statement.id))
            .count()
            .get_result(&mut ctx.get_db_conn().await?)
            .await?;
        let mut entry = statement_json(statement);
        entry["selected_count"] = json!(selected_count);
        entries.push(entry);
    }

    Ok((StatusCode::OK, json!({ "statements": entries })))
}

pub async fn teams_for_statement(ctx: &Context, statement_id: Uuid) -> JsonResult {
    ctx.require_admin().await?;

    let exists = crate::db::schema::problem_statements::table
        .find(statement_id)
        .select(crate::db::schema::problem_statements::id)
        .first::<Uuid>(&mut ctx.get_db_conn().await?)
        .await
        .optional()?;
    if exists.is_none() {
        return Err(ApiError::NotFound("Problem statement not found".to_string()));
    }

    let teams = crate::db::schema::teams::table
        .filter(crate::db::schema::teams::selected_problem_statement_id.eq(statement_id))
        .select(Team::as_select())
        .load::<Team>(&mut ctx.get_db_conn().await?)
        .await?;
    let member_groups = Member::belonging_to(&teams)
        .order(crate::db::schema::members::position.asc())
        .load::<Member>(&mut ctx.get_db_conn().await?)
        .await?
        .grouped_by(&teams);

    let summaries: Vec<_> = teams
        .iter()
        .zip(&member_groups)
        .map(|(team, members)| team_summary_json(team, members))
        .collect();

    Ok((StatusCode::OK, json!({ "teams": summaries })))
}

#[derive(Deserialize, Debug)]
pub struct SelectStatementRequest {
    #[serde(default)]
    pub team_id: Option<Uuid>,
    #[serde(default)]
    pub problem_statement_id: Option<Uuid>,
}

/// One-shot, irreversible selection. Any existing selection, including a
/// resubmission of the same statement, is rejected with no state change.
/// When the statement's domain differs from the team's house, the house is
/// overwritten to match.
pub async fn select_statement(ctx: &Context, request: SelectStatementRequest) -> JsonResult {
    let (team_id, statement_id) = match (request.team_id, request.problem_statement_id) {
        (Some(team_id), Some(statement_id)) => (team_id, statement_id),
        _ => {
            return Err(ApiError::Validation(
                "Team ID and Problem Statement ID are required".to_string(),
            ));
        }
    };

    let mut conn = ctx.get_db_conn().await?;
    let team = crate::db::schema::teams::table
        .find(team_id)
        .select(Team::as_select())
        .first::<Team>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::NotFound("Team not found".to_string()))?;

    if team.approval_status != ApprovalStatus::Approved {
        return Err(ApiError::Forbidden("Team is not approved yet".to_string()));
    }

    if let Some(existing) = team.selected_problem_statement_id {
        let message = if existing == statement_id {
            "You have already applied for this problem statement. Resubmission is not allowed."
        } else {
            "You have already applied for a problem statement. Resubmission or changing your selection is not allowed."
        };
        return Err(ApiError::Validation(message.to_string()));
    }

    let statement = crate::db::schema::problem_statements::table
        .find(statement_id)
        .select(ProblemStatement::as_select())
        .first::<ProblemStatement>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::NotFound("Problem statement not found".to_string()))?;

    let new_house = if statement.domain != team.house {
        statement.domain
    } else {
        team.house
    };
    let team = diesel::update(crate::db::schema::teams::table.find(team_id))
        .set((
            crate::db::schema::teams::selected_problem_statement_id.eq(Some(statement_id)),
            crate::db::schema::teams::house.eq(new_house),
        ))
        .get_result::<Team>(&mut conn)
        .await?;

    let members = crate::db::schema::members::table
        .filter(crate::db::schema::members::team_id.eq(team.id))
        .order(crate::db::schema::members::position.asc())
        .load::<Member>(&mut conn)
        .await?;

    Ok((
        StatusCode::OK,
        json!({
            "message": "Problem statement selected successfully",
            "team": crate::api::handlers::teams::team_detail_json(&team, &members),
        }),
    ))
}
