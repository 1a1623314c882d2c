// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use argon2::{
    Argon2, PasswordVerifier,
    password_hash::{PasswordHasher, SaltString},
};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use hyper::StatusCode;
use rand_core::OsRng;
use serde::Deserialize;
use serde_json::json;

use crate::api::handlers::JsonResult;
use crate::api::handlers::settings::{LOGIN_ENABLED, setting_enabled};
use crate::api::{ApiError, Context};
use crate::db::lower;
use crate::db::models::{Admin, ApprovalStatus, NewSession, Team, TeamLogin};

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ApiError::Internal(format!("failed to hash password: {err}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    argon2::PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[derive(Deserialize, Debug)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
}

async fn create_admin_session(ctx: &Context, admin: &Admin) -> Result<String, ApiError> {
    let session_token = uuid::Uuid::now_v7().to_string();

    diesel::insert_into(crate::db::schema::sessions::table)
        .values(NewSession {
            admin_id: admin.id,
            session_token: session_token.clone(),
            expires_at: chrono::Utc::now() + chrono::Duration::days(7),
            user_agent: Some(ctx.get_user_agent().to_string()),
            ip_address: Some(match ctx.get_ip() {
                // These functions only return an Err() if prefix_len is too long, but the ones here are hardcoded
                // Unless the IP standard changes, this will not panic
                std::net::IpAddr::V4(_) => ipnet::IpNet::new(*ctx.get_ip(), 32).unwrap(),
                std::net::IpAddr::V6(_) => ipnet::IpNet::new(*ctx.get_ip(), 128).unwrap(),
            }),
        })
        .execute(&mut ctx.get_db_conn().await?)
        .await?;

    Ok(session_token)
}

/// Two disjoint credential paths: the admin row (argon2-hashed) and the
/// team-lead logins provisioned at approval. A mismatch on either path
/// answers with the same message, never naming the failing field.
pub async fn login(ctx: &Context, request: LoginRequest) -> JsonResult {
    let username = request.username.trim();
    let password = request.password.trim();
    if username.is_empty() || password.is_empty() {
        return Err(ApiError::Validation(
            "Username and password are required".to_string(),
        ));
    }

    let admin_row = crate::db::schema::admins::table
        .filter(lower(crate::db::schema::admins::username).eq(username.to_lowercase()))
        .select(Admin::as_select())
        .first::<Admin>(&mut ctx.get_db_conn().await?)
        .await
        .optional()?;

    if request.is_admin || admin_row.is_some() {
        let admin = admin_row
            .ok_or_else(|| ApiError::Unauthorized("Invalid username or password".to_string()))?;
        if !verify_password(password, &admin.password_hash) {
            return Err(ApiError::Unauthorized(
                "Invalid username or password".to_string(),
            ));
        }

        let token = create_admin_session(ctx, &admin).await?;
        return Ok((
            StatusCode::OK,
            json!({
                "message": "Admin login successful",
                "is_admin": true,
                "token": token,
                "admin": { "username": admin.username },
            }),
        ));
    }

    if !setting_enabled(ctx, LOGIN_ENABLED).await? {
        return Err(ApiError::FeatureDisabled(
            "Logins are currently disabled".to_string(),
        ));
    }

    let team_login = crate::db::schema::team_logins::table
        .filter(lower(crate::db::schema::team_logins::username).eq(username.to_lowercase()))
        .select(TeamLogin::as_select())
        .first::<TeamLogin>(&mut ctx.get_db_conn().await?)
        .await
        .optional()?
        .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".to_string()))?;

    if team_login.password != password {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    let team = crate::db::schema::teams::table
        .find(team_login.team_id)
        .select(Team::as_select())
        .first::<Team>(&mut ctx.get_db_conn().await?)
        .await
        .optional()?
        .ok_or_else(|| ApiError::NotFound("Team not found".to_string()))?;

    if team.approval_status != ApprovalStatus::Approved {
        return Err(ApiError::Forbidden("Team is not approved yet".to_string()));
    }

    Ok((
        StatusCode::OK,
        json!({
            "message": "Login successful",
            "is_admin": false,
            "team": {
                "id": team.id,
                "team_name": team.name,
                "house": team.house.as_str(),
                "selected_problem_statement_id": team.selected_problem_statement_id,
            },
        }),
    ))
}

/// Delete the presented admin session; the token stops working immediately.
pub async fn logout(ctx: &Context) -> JsonResult {
    let token = ctx
        .admin_token()
        .ok_or_else(|| ApiError::Unauthorized("No session token presented".to_string()))?;

    diesel::delete(
        crate::db::schema::sessions::table
            .filter(crate::db::schema::sessions::session_token.eq(token)),
    )
    .execute(&mut ctx.get_db_conn().await?)
    .await?;

    Ok((StatusCode::OK, json!({ "message": "Session ended" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_and_verify_round_trip() {
        let hash = hash_password("hogwarts school").expect("hashing should succeed");
        assert!(verify_password("hogwarts school", &hash));
        assert!(!verify_password("hogwarts", &hash));
    }

    #[test]
    fn test_verify_password_rejects_malformed_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }
}
