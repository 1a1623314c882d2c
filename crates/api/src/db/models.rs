// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use chrono::{DateTime, Utc};
use diesel::associations::Identifiable;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::schema::*;

#[derive(
    diesel_derive_enum::DbEnum, Debug, PartialEq, Eq, Deserialize, Serialize, Clone, Copy,
)]
#[DbValueStyle = "UPPERCASE"]
#[ExistingTypePath = "crate::db::schema::sql_types::HouseKind"]
pub enum House {
    Gryffindor,
    Slytherin,
    Ravenclaw,
    Hufflepuff,
    Muggles,
}

impl House {
    pub const ALL: [House; 5] = [
        House::Gryffindor,
        House::Slytherin,
        House::Ravenclaw,
        House::Hufflepuff,
        House::Muggles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            House::Gryffindor => "Gryffindor",
            House::Slytherin => "Slytherin",
            House::Ravenclaw => "Ravenclaw",
            House::Hufflepuff => "Hufflepuff",
            House::Muggles => "Muggles",
        }
    }

    /// Case-insensitive parse of externally supplied house/domain names.
    pub fn parse(input: &str) -> Option<House> {
        House::ALL
            .into_iter()
            .find(|house| house.as_str().eq_ignore_ascii_case(input.trim()))
    }
}

#[derive(
    diesel_derive_enum::DbEnum, Debug, PartialEq, Eq, Deserialize, Serialize, Clone, Copy,
)]
#[DbValueStyle = "UPPERCASE"]
#[ExistingTypePath = "crate::db::schema::sql_types::ApprovalStatus"]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
}

#[derive(
    diesel_derive_enum::DbEnum, Debug, PartialEq, Eq, Deserialize, Serialize, Clone, Copy,
)]
#[DbValueStyle = "UPPERCASE"]
#[ExistingTypePath = "crate::db::schema::sql_types::Difficulty"]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn parse(input: &str) -> Option<Difficulty> {
        match input.trim().to_ascii_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

/* =========================
 * TEAMS
 * ========================= */

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = teams)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub house: House,
    pub team_size: i32,
    pub utr_transaction_id: String,
    pub payment_proof_path: Option<String>,
    pub approval_status: ApprovalStatus,
    pub selected_problem_statement_id: Option<Uuid>,
    pub git_repo_url: Option<String>,
    pub registered_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = teams)]
pub struct NewTeam {
    pub name: String,
    pub house: House,
    pub team_size: i32,
    pub utr_transaction_id: String,
    pub payment_proof_path: Option<String>,
    pub approval_status: ApprovalStatus,
    pub git_repo_url: Option<String>,
}

/* =========================
 * MEMBERS
 * ========================= */

#[derive(Queryable, Selectable, Identifiable, Associations, Debug, Clone)]
#[diesel(table_name = members)]
#[diesel(belongs_to(Team))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Member {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub college: String,
    pub is_leader: bool,
    pub position: i32,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = members)]
pub struct NewMember {
    pub team_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub college: String,
    pub is_leader: bool,
    pub position: i32,
}

/* =========================
 * PROBLEM STATEMENTS
 * ========================= */

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = problem_statements)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProblemStatement {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub domain: House,
    pub difficulty: Difficulty,
    pub house: Option<House>,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = problem_statements)]
pub struct NewProblemStatement {
    pub title: String,
    pub description: String,
    pub domain: House,
    pub difficulty: Difficulty,
    pub house: Option<House>,
}

/* =========================
 * TEAM LOGINS
 * ========================= */

#[derive(Queryable, Selectable, Identifiable, Associations, Debug)]
#[diesel(table_name = team_logins)]
#[diesel(belongs_to(Team))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TeamLogin {
    pub id: Uuid,
    pub team_id: Uuid,
    pub username: String,
    pub password: String,
    pub house: House,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = team_logins)]
pub struct NewTeamLogin {
    pub team_id: Uuid,
    pub username: String,
    pub password: String,
    pub house: House,
}

/* =========================
 * REVIEWS
 * ========================= */

#[derive(Queryable, Selectable, Identifiable, Associations, Debug, Clone)]
#[diesel(table_name = reviews)]
#[diesel(belongs_to(Team))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Review {
    pub id: Uuid,
    pub team_id: Uuid,
    pub round1_marks: i32,
    pub round2_marks: i32,
    pub round3_marks: i32,
    pub round1_data: Option<String>,
    pub round2_data: Option<String>,
    pub round3_data: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Review {
    /// Marks column and raw JSON blob for one round. Round must be 1..=3.
    pub fn round_columns(&self, round: i32) -> (i32, Option<&str>) {
        match round {
            1 => (self.round1_marks, self.round1_data.as_deref()),
            2 => (self.round2_marks, self.round2_data.as_deref()),
            _ => (self.round3_marks, self.round3_data.as_deref()),
        }
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = reviews)]
pub struct NewReview {
    pub team_id: Uuid,
    pub round1_marks: i32,
    pub round2_marks: i32,
    pub round3_marks: i32,
    pub round1_data: Option<String>,
    pub round2_data: Option<String>,
    pub round3_data: Option<String>,
}

/* =========================
 * ADMIN SETTINGS
 * ========================= */

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = admin_settings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AdminSetting {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = admin_settings)]
pub struct NewAdminSetting {
    pub key: String,
    pub value: String,
}

/* =========================
 * ADMINS
 * ========================= */

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = admins)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Admin {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = admins)]
pub struct NewAdmin {
    pub username: String,
    pub password_hash: String,
}

/* =========================
 * SESSIONS
 * ========================= */

#[derive(Queryable, Selectable, Identifiable, Associations, Debug)]
#[diesel(table_name = sessions)]
#[diesel(belongs_to(Admin))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Session {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub session_token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub ip_address: Option<ipnet::IpNet>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = sessions)]
pub struct NewSession {
    pub admin_id: Uuid,
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub ip_address: Option<ipnet::IpNet>,
}

/* =========================
 * SPONSORS
 * ========================= */

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = sponsors)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Sponsor {
    pub id: Uuid,
    pub name: String,
    pub logo_path: String,
    pub redirect_url: Option<String>,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = sponsors)]
pub struct NewSponsor {
    pub name: String,
    pub logo_path: String,
    pub redirect_url: Option<String>,
    pub display_order: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_house_parse_is_case_insensitive() {
        assert_eq!(House::parse("gryffindor"), Some(House::Gryffindor));
        assert_eq!(House::parse(" MUGGLES "), Some(House::Muggles));
        assert_eq!(House::parse("Durmstrang"), None);
    }

    #[test]
    fn test_difficulty_parse() {
        assert_eq!(Difficulty::parse("Easy"), Some(Difficulty::Easy));
        assert_eq!(Difficulty::parse("hard"), Some(Difficulty::Hard));
        assert_eq!(Difficulty::parse("impossible"), None);
    }
}
