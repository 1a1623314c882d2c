// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use hyper::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::api::handlers::JsonResult;
use crate::api::handlers::settings::{REGISTRATION_ENABLED, setting_enabled};
use crate::api::handlers::teams::team_detail_json;
use crate::api::{ApiError, Context};
use crate::db::lower;
use crate::db::models::{ApprovalStatus, House, Member, NewMember, NewTeam, Team};
use crate::upload::FilePayload;

pub const MIN_TEAM_SIZE: i32 = 1;
pub const MAX_TEAM_SIZE: i32 = 4;

#[derive(Deserialize, Debug)]
pub struct MemberInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub college: String,
}

#[derive(Deserialize, Debug)]
pub struct RegistrationRequest {
    #[serde(default)]
    pub team_name: String,
    #[serde(default)]
    pub house: String,
    #[serde(default)]
    pub team_size: i32,
    #[serde(default)]
    pub utr_transaction_id: String,
    #[serde(default)]
    pub git_repo_url: Option<String>,
    #[serde(default)]
    pub payment_proof: Option<FilePayload>,
    #[serde(default)]
    pub members: Vec<MemberInput>,
}

/// Team-level fields after validation and normalization. Member validation
/// is a separate stage, run after the name-uniqueness check.
#[derive(Debug)]
pub struct ValidatedTeamFields {
    pub team_name: String,
    pub house: House,
    pub team_size: i32,
    pub utr_transaction_id: String,
    pub git_repo_url: Option<String>,
}

/// Collapse surrounding and repeated inner whitespace, so names differing
/// only in spacing compare equal.
pub fn normalize_team_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn validate_team_fields(request: &RegistrationRequest) -> Result<ValidatedTeamFields, ApiError> {
    let team_name = normalize_team_name(&request.team_name);
    if team_name.is_empty() {
        return Err(ApiError::Validation("Team name is required".to_string()));
    }

    let house = House::parse(&request.house)
        .ok_or_else(|| ApiError::Validation("House selection is required".to_string()))?;

    if !(MIN_TEAM_SIZE..=MAX_TEAM_SIZE).contains(&request.team_size) {
        return Err(ApiError::Validation(
            "Team size must be between 1 and 4".to_string(),
        ));
    }

    let utr_transaction_id = request.utr_transaction_id.trim().to_string();
    if utr_transaction_id.is_empty() {
        return Err(ApiError::Validation(
            "UTR/Transaction ID is required".to_string(),
        ));
    }

    let git_repo_url = request
        .git_repo_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string);

    Ok(ValidatedTeamFields {
        team_name,
        house,
        team_size: request.team_size,
        utr_transaction_id,
        git_repo_url,
    })
}

/// Per-member validation: one record per declared seat, every field present,
/// no email used twice within the same request.
pub fn validate_members(
    team_size: i32,
    members: Vec<MemberInput>,
) -> Result<Vec<MemberInput>, ApiError> {
    if members.len() != team_size as usize {
        return Err(ApiError::Validation(format!(
            "Details for all {team_size} members are required"
        )));
    }

    let mut validated = Vec::with_capacity(members.len());
    let mut seen_emails = std::collections::HashSet::new();
    for (index, member) in members.into_iter().enumerate() {
        let member = MemberInput {
            name: member.name.trim().to_string(),
            email: member.email.trim().to_string(),
            phone: member.phone.trim().to_string(),
            college: member.college.trim().to_string(),
        };
        if member.name.is_empty()
            || member.email.is_empty()
            || member.phone.is_empty()
            || member.college.is_empty()
        {
            return Err(ApiError::Validation(format!(
                "All fields including college name are required for member {}",
                index + 1
            )));
        }
        if !seen_emails.insert(member.email.to_lowercase()) {
            return Err(ApiError::Validation(format!(
                "Email {} is used more than once",
                member.email
            )));
        }
        validated.push(member);
    }

    Ok(validated)
}

pub async fn register_team(ctx: &Context, request: RegistrationRequest) -> JsonResult {
    if !setting_enabled(ctx, REGISTRATION_ENABLED).await? {
        return Err(ApiError::FeatureDisabled(
            "Registrations are currently closed".to_string(),
        ));
    }

    let team_fields = validate_team_fields(&request)?;

    // A proof of the wrong type is skipped, not rejected; the file hits the
    // disk before any row is committed.
    let payment_proof_path = match &request.payment_proof {
        Some(payload) if crate::upload::allowed_file(&payload.filename) => {
            Some(crate::upload::store(ctx.upload_dir(), payload).await?)
        }
        _ => None,
    };
    let member_inputs = request.members;

    let mut conn = ctx.get_db_conn().await?;
    let team = conn
        .transaction::<Team, ApiError, _>(|conn| {
            async move {
                use crate::db::schema::{members, teams};

                let existing = teams::table
                    .filter(lower(teams::name).eq(team_fields.team_name.to_lowercase()))
                    .select(teams::id)
                    .first::<uuid::Uuid>(conn)
                    .await
                    .optional()?;
                if existing.is_some() {
                    return Err(ApiError::Validation("Team name already exists".to_string()));
                }

                let member_inputs = validate_members(team_fields.team_size, member_inputs)?;

                let emails: Vec<&str> = member_inputs
                    .iter()
                    .map(|member| member.email.as_str())
                    .collect();
                let taken = members::table
                    .filter(members::email.eq_any(emails))
                    .select(members::email)
                    .first::<String>(conn)
                    .await
                    .optional()?;
                if let Some(email) = taken {
                    return Err(ApiError::Validation(format!(
                        "Email {email} is already registered"
                    )));
                }

                let team = diesel::insert_into(teams::table)
                    .values(NewTeam {
                        name: team_fields.team_name.clone(),
                        house: team_fields.house,
                        team_size: team_fields.team_size,
                        utr_transaction_id: team_fields.utr_transaction_id.clone(),
                        payment_proof_path,
                        approval_status: ApprovalStatus::Pending,
                        git_repo_url: team_fields.git_repo_url.clone(),
                    })
                    .returning(Team::as_returning())
                    .get_result::<Team>(conn)
                    .await?;

                let new_members: Vec<NewMember> = member_inputs
                    .iter()
                    .enumerate()
                    .map(|(index, member)| NewMember {
                        team_id: team.id,
                        name: member.name.clone(),
                        email: member.email.clone(),
                        phone: member.phone.clone(),
                        college: member.college.clone(),
                        is_leader: index == 0,
                        position: index as i32 + 1,
                    })
                    .collect();
                diesel::insert_into(members::table)
                    .values(&new_members)
                    .execute(conn)
                    .await?;

                Ok(team)
            }
            .scope_boxed()
        })
        .await?;

    // Read the row back before declaring success; a 201 implies the data
    // is durably stored.
    let saved = crate::db::schema::teams::table
        .find(team.id)
        .select(Team::as_select())
        .first::<Team>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::Internal("Registration failed - data not saved".to_string()))?;
    let saved_members = crate::db::schema::members::table
        .filter(crate::db::schema::members::team_id.eq(saved.id))
        .order(crate::db::schema::members::position.asc())
        .load::<Member>(&mut conn)
        .await?;

    Ok((
        StatusCode::CREATED,
        json!({
            "message": "Team registered successfully",
            "team_id": saved.id,
            "team": team_detail_json(&saved, &saved_members),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RegistrationRequest {
        RegistrationRequest {
            team_name: "Dumbledore's Army".to_string(),
            house: "Gryffindor".to_string(),
            team_size: 2,
            utr_transaction_id: "UTR123456".to_string(),
            git_repo_url: None,
            payment_proof: None,
            members: Vec::new(),
        }
    }

    fn member(name: &str, email: &str) -> MemberInput {
        MemberInput {
            name: name.to_string(),
            email: email.to_string(),
            phone: "1234567890".to_string(),
            college: "Hogwarts".to_string(),
        }
    }

    #[test]
    fn test_normalize_team_name_collapses_whitespace() {
        assert_eq!(normalize_team_name("  Dumbledore's   Army "), "Dumbledore's Army");
        assert_eq!(normalize_team_name("\tTeam\nRocket"), "Team Rocket");
    }

    #[test]
    fn test_validate_team_fields_accepts_well_formed_request() {
        let validated = validate_team_fields(&request()).expect("request should validate");
        assert_eq!(validated.house, House::Gryffindor);
        assert_eq!(validated.team_name, "Dumbledore's Army");
    }

    #[test]
    fn test_validate_team_fields_rejects_missing_name() {
        let mut bad = request();
        bad.team_name = "   ".to_string();
        let err = validate_team_fields(&bad).expect_err("blank name must fail");
        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(err.public_message(), "Team name is required");
    }

    #[test]
    fn test_validate_team_fields_rejects_unknown_house() {
        let mut bad = request();
        bad.house = "Durmstrang".to_string();
        assert!(matches!(
            validate_team_fields(&bad),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_team_fields_rejects_out_of_range_size() {
        let mut bad = request();
        bad.team_size = 5;
        let err = validate_team_fields(&bad).expect_err("size 5 must fail");
        assert_eq!(err.public_message(), "Team size must be between 1 and 4");
    }

    #[test]
    fn test_validate_team_fields_rejects_missing_transaction_id() {
        let mut bad = request();
        bad.utr_transaction_id = " ".to_string();
        let err = validate_team_fields(&bad).expect_err("blank UTR must fail");
        assert_eq!(err.public_message(), "UTR/Transaction ID is required");
    }

    #[test]
    fn test_validate_members_rejects_count_mismatch() {
        let err = validate_members(2, vec![member("Harry", "h@example.com")])
            .expect_err("one of two members must fail");
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn test_validate_members_rejects_incomplete_member() {
        let mut incomplete = member("Harry", "h@example.com");
        incomplete.college = String::new();
        let err = validate_members(1, vec![incomplete]).expect_err("missing college must fail");
        assert_eq!(
            err.public_message(),
            "All fields including college name are required for member 1"
        );
    }

    #[test]
    fn test_validate_members_rejects_duplicate_emails_within_request() {
        let err = validate_members(
            2,
            vec![
                member("Harry", "same@hogwarts.example"),
                member("Hermione", "Same@Hogwarts.example"),
            ],
        )
        .expect_err("duplicate email must fail");
        assert!(err.public_message().contains("used more than once"));
    }

    #[test]
    fn test_validate_members_trims_fields() {
        let validated = validate_members(1, vec![member(" Harry ", " h@example.com ")])
            .expect("member should validate");
        assert_eq!(validated[0].name, "Harry");
        assert_eq!(validated[0].email, "h@example.com");
    }
}
