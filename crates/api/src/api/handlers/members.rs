// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use hyper::StatusCode;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::api::handlers::JsonResult;
use crate::api::handlers::registration::MAX_TEAM_SIZE;
use crate::api::handlers::teams::{member_json, team_detail_json};
use crate::api::{ApiError, Context};
use crate::db::models::{Member, NewMember, Team};

#[derive(Deserialize, Debug)]
pub struct AddMemberRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub college: String,
    #[serde(default)]
    pub is_leader: bool,
}

async fn load_team(ctx: &Context, team_id: Uuid) -> Result<Team, ApiError> {
    crate::db::schema::teams::table
        .find(team_id)
        .select(Team::as_select())
        .first::<Team>(&mut ctx.get_db_conn().await?)
        .await
        .optional()?
        .ok_or_else(|| ApiError::NotFound("Team not found".to_string()))
}

async fn team_with_members_json(
    ctx: &Context,
    team: &Team,
) -> Result<serde_json::Value, ApiError> {
    let members = crate::db::schema::members::table
        .filter(crate::db::schema::members::team_id.eq(team.id))
        .order(crate::db::schema::members::position.asc())
        .load::<Member>(&mut ctx.get_db_conn().await?)
        .await?;
    Ok(team_detail_json(team, &members))
}

pub async fn add_member(ctx: &Context, team_id: Uuid, request: AddMemberRequest) -> JsonResult {
    ctx.require_admin().await?;
    load_team(ctx, team_id).await?;

    let name = request.name.trim().to_string();
    let email = request.email.trim().to_string();
    let phone = request.phone.trim().to_string();
    let college = request.college.trim().to_string();
    if name.is_empty() || email.is_empty() || phone.is_empty() || college.is_empty() {
        return Err(ApiError::Validation(
            "Name, email, phone, and college name are required".to_string(),
        ));
    }

    let mut conn = ctx.get_db_conn().await?;
    let (team, member) = conn
        .transaction::<(Team, Member), ApiError, _>(|conn| {
            async move {
                use crate::db::schema::{members, teams};

                let current: i64 = members::table
                    .filter(members::team_id.eq(team_id))
                    .count()
                    .get_result(conn)
                    .await?;
                if current >= MAX_TEAM_SIZE as i64 {
                    return Err(ApiError::Validation(format!(
                        "Team already has maximum {MAX_TEAM_SIZE} members"
                    )));
                }

                let taken = members::table
                    .filter(members::email.eq(&email))
                    .select(members::id)
                    .first::<Uuid>(conn)
                    .await
                    .optional()?;
                if taken.is_some() {
                    return Err(ApiError::Validation(format!(
                        "Email {email} is already registered"
                    )));
                }

                let max_position: Option<i32> = members::table
                    .filter(members::team_id.eq(team_id))
                    .select(diesel::dsl::max(members::position))
                    .first(conn)
                    .await?;

                // The first member is always the leader; an explicit flag
                // transfers leadership from the current one.
                let will_be_leader = current == 0 || request.is_leader;
                if will_be_leader && current > 0 {
                    diesel::update(
                        members::table
                            .filter(members::team_id.eq(team_id))
                            .filter(members::is_leader.eq(true)),
                    )
                    .set(members::is_leader.eq(false))
                    .execute(conn)
                    .await?;
                }

                let member = diesel::insert_into(members::table)
                    .values(NewMember {
                        team_id,
                        name,
                        email,
                        phone,
                        college,
                        is_leader: will_be_leader,
                        position: max_position.unwrap_or(0) + 1,
                    })
                    .returning(Member::as_returning())
                    .get_result::<Member>(conn)
                    .await?;

                let team = diesel::update(teams::table.find(team_id))
                    .set(teams::team_size.eq(current as i32 + 1))
                    .get_result::<Team>(conn)
                    .await?;

                Ok((team, member))
            }
            .scope_boxed()
        })
        .await?;

    Ok((
        StatusCode::OK,
        json!({
            "message": "Member added successfully",
            "member": member_json(&member),
            "team": team_with_members_json(ctx, &team).await?,
        }),
    ))
}

pub async fn remove_member(ctx: &Context, team_id: Uuid, member_id: Uuid) -> JsonResult {
    ctx.require_admin().await?;
    load_team(ctx, team_id).await?;

    let mut conn = ctx.get_db_conn().await?;
    let team = conn
        .transaction::<Team, ApiError, _>(|conn| {
            async move {
                use crate::db::schema::{members, teams};

                let member = members::table
                    .filter(members::id.eq(member_id))
                    .filter(members::team_id.eq(team_id))
                    .select(Member::as_select())
                    .first::<Member>(conn)
                    .await
                    .optional()?
                    .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;

                let current: i64 = members::table
                    .filter(members::team_id.eq(team_id))
                    .count()
                    .get_result(conn)
                    .await?;
                if current <= 1 {
                    return Err(ApiError::Validation(
                        "Cannot remove the last member from a team".to_string(),
                    ));
                }

                diesel::delete(members::table.find(member.id)).execute(conn).await?;

                let remaining = members::table
                    .filter(members::team_id.eq(team_id))
                    .order(members::position.asc())
                    .load::<Member>(conn)
                    .await?;

                // Removing the leader promotes the lowest-ordinal survivor.
                if member.is_leader {
                    if let Some(next_lead) = remaining.as_slice().first() {
                        diesel::update(members::table.find(next_lead.id))
                            .set(members::is_leader.eq(true))
                            .execute(conn)
                            .await?;
                    }
                }

                // Re-pack ordinals to 1..n.
                for (index, remaining_member) in remaining.iter().enumerate() {
                    diesel::update(members::table.find(remaining_member.id))
                        .set(members::position.eq(index as i32 + 1))
                        .execute(conn)
                        .await?;
                }

                let team = diesel::update(teams::table.find(team_id))
                    .set(teams::team_size.eq(remaining.len() as i32))
                    .get_result::<Team>(conn)
                    .await?;

                Ok(team)
            }
            .scope_boxed()
        })
        .await?;

    Ok((
        StatusCode::OK,
        json!({
            "message": "Member removed successfully",
            "team": team_with_members_json(ctx, &team).await?,
        }),
    ))
}
