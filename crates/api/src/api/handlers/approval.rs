// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use hyper::StatusCode;
use serde_json::json;
use uuid::Uuid;

use crate::api::handlers::JsonResult;
use crate::api::handlers::teams::team_detail_json;
use crate::api::{ApiError, Context};
use crate::db::models::{ApprovalStatus, Member, NewTeamLogin, Team};

/// Approve a team: provision (or re-sync) its single login row, recompute
/// the stored size from the live member count and flip the status, all in
/// one transaction. The credentials email afterwards is best-effort.
pub async fn approve_team(ctx: &Context, team_id: Uuid) -> JsonResult {
    ctx.require_admin().await?;

    let mut conn = ctx.get_db_conn().await?;
    let team = crate::db::schema::teams::table
        .find(team_id)
        .select(Team::as_select())
        .first::<Team>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::NotFound("Team not found".to_string()))?;

    let (team, lead) = conn
        .transaction::<(Team, Member), ApiError, _>(|conn| {
            async move {
                use crate::db::schema::{members, team_logins, teams};

                // Flagged leader, else the lowest-ordinal member.
                let mut lead = members::table
                    .filter(members::team_id.eq(team_id))
                    .filter(members::is_leader.eq(true))
                    .select(Member::as_select())
                    .first::<Member>(conn)
                    .await
                    .optional()?;
                if lead.is_none() {
                    lead = members::table
                        .filter(members::team_id.eq(team_id))
                        .order(members::position.asc())
                        .select(Member::as_select())
                        .first::<Member>(conn)
                        .await
                        .optional()?;
                }
                let lead = lead
                    .ok_or_else(|| ApiError::Validation("Team lead not found".to_string()))?;

                // At most one login row per team; re-approval re-syncs the
                // credentials in case the transaction id was corrected.
                diesel::insert_into(team_logins::table)
                    .values(NewTeamLogin {
                        team_id,
                        username: lead.name.clone(),
                        password: team.utr_transaction_id.clone(),
                        house: team.house,
                    })
                    .on_conflict(team_logins::team_id)
                    .do_update()
                    .set((
                        team_logins::username.eq(lead.name.clone()),
                        team_logins::password.eq(team.utr_transaction_id.clone()),
                        team_logins::house.eq(team.house),
                    ))
                    .execute(conn)
                    .await?;

                // Members may have been removed since registration.
                let member_count: i64 = members::table
                    .filter(members::team_id.eq(team_id))
                    .count()
                    .get_result(conn)
                    .await?;

                let team = diesel::update(teams::table.find(team_id))
                    .set((
                        teams::team_size.eq(member_count as i32),
                        teams::approval_status.eq(ApprovalStatus::Approved),
                    ))
                    .get_result::<Team>(conn)
                    .await?;

                Ok((team, lead))
            }
            .scope_boxed()
        })
        .await?;

    let mut email_sent = false;
    let mut email_error = None;
    match ctx.mailer() {
        Some(mailer) => {
            match mailer
                .send_credentials_email(
                    &lead.email,
                    &team.name,
                    &lead.name,
                    &lead.name,
                    &team.utr_transaction_id,
                )
                .await
            {
                Ok(()) => email_sent = true,
                Err(err) => {
                    tracing::warn!("credentials email to {} failed: {err}", lead.email);
                    email_error = Some(err.to_string());
                }
            }
        }
        None => {
            tracing::warn!(
                "email is not configured; credentials for team {} were not sent",
                team.name
            );
        }
    }

    let mut message = format!(
        "Team {} has been approved. Login credentials created.",
        team.name
    );
    if email_sent {
        message.push_str(" Credentials have been sent to the team lead via email.");
    } else if let Some(err) = email_error {
        message.push_str(&format!(
            " Note: the credentials email could not be sent ({err}); the credentials are still available."
        ));
    }

    let members = crate::db::schema::members::table
        .filter(crate::db::schema::members::team_id.eq(team.id))
        .order(crate::db::schema::members::position.asc())
        .load::<Member>(&mut conn)
        .await?;

    Ok((
        StatusCode::OK,
        json!({
            "message": message,
            "team": team_detail_json(&team, &members),
            "login": {
                "username": lead.name,
                "password": team.utr_transaction_id,
                "house": team.house.as_str(),
            },
            "email_sent": email_sent,
        }),
    ))
}

/// Reject a team: a hard, cascading delete of the team and everything that
/// hangs off it, not a status flag.
pub async fn reject_team(ctx: &Context, team_id: Uuid) -> JsonResult {
    ctx.require_admin().await?;

    let mut conn = ctx.get_db_conn().await?;
    let team_name = crate::db::schema::teams::table
        .find(team_id)
        .select(crate::db::schema::teams::name)
        .first::<String>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::NotFound("Team not found".to_string()))?;

    conn.transaction::<(), ApiError, _>(|conn| {
        async move {
            use crate::db::schema::{members, reviews, team_logins, teams};

            // Dependents first, to satisfy the foreign keys.
            diesel::delete(team_logins::table.filter(team_logins::team_id.eq(team_id)))
                .execute(conn)
                .await?;
            diesel::delete(reviews::table.filter(reviews::team_id.eq(team_id)))
                .execute(conn)
                .await?;
            diesel::delete(members::table.filter(members::team_id.eq(team_id)))
                .execute(conn)
                .await?;
            diesel::delete(teams::table.find(team_id)).execute(conn).await?;

            Ok(())
        }
        .scope_boxed()
    })
    .await?;

    // Verify the row is really gone before reporting the deletion.
    let still_there = crate::db::schema::teams::table
        .find(team_id)
        .select(crate::db::schema::teams::id)
        .first::<Uuid>(&mut conn)
        .await
        .optional()?;
    if still_there.is_some() {
        return Err(ApiError::Internal(
            "Team still exists after deletion attempt".to_string(),
        ));
    }

    Ok((
        StatusCode::OK,
        json!({
            "message": format!("Team {team_name} has been rejected and deleted"),
            "deleted": true,
        }),
    ))
}
