// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use base64::prelude::*;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use slugify::slugify;
use uuid::Uuid;

use crate::api::{ApiError, Context};
use crate::db::models::{ApprovalStatus, House, Member, Team};

pub fn crest_filename(house: House) -> &'static str {
    match house {
        House::Gryffindor => "gryffindor.png",
        House::Slytherin => "slytherin.png",
        House::Ravenclaw => "ravenclaw.png",
        House::Hufflepuff => "hufflepuff.png",
        House::Muggles => "muggles.png",
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Self-contained ticket document: no external references, the house crest
/// rides along as an inline data URI.
pub fn render_ticket(team: &Team, members: &[Member], crest_data_uri: &str) -> String {
    let member_items: String = members
        .iter()
        .map(|member| {
            let badge = if member.is_leader { " (Leader)" } else { "" };
            format!("      <li>{}{badge}</li>\n", escape_html(&member.name))
        })
        .collect();

    format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head>\n\
         <meta charset=\"UTF-8\">\n\
         <title>Hackathon Ticket</title>\n\
         <style>\n\
         body {{ font-family: serif; background: #f3e9d2; padding: 40px; }}\n\
         .ticket {{ max-width: 640px; margin: 0 auto; border: 4px solid #2c1b18; padding: 30px; }}\n\
         .crest {{ width: 120px; height: 120px; object-fit: contain; float: right; }}\n\
         h1 {{ letter-spacing: 2px; }}\n\
         .rules {{ font-size: 0.8em; text-transform: uppercase; margin-top: 30px; }}\n\
         </style>\n\
         </head>\n\
         <body>\n\
         <div class=\"ticket\">\n\
         <img class=\"crest\" src=\"{crest}\" alt=\"{house} crest\">\n\
         <h1>{team_name}</h1>\n\
         <p><strong>House:</strong> {house} | <strong>Team size:</strong> {team_size} members</p>\n\
         <p><strong>Registered:</strong> {registered}</p>\n\
         <p><strong>Transaction ID:</strong> {utr}</p>\n\
         <p><strong>Team members:</strong></p>\n\
         <ul>\n{member_items}    </ul>\n\
         <p class=\"rules\">Admits the team above to the hackathon. Follow the rules and regulations of the event.</p>\n\
         </div>\n\
         </body>\n\
         </html>\n",
        crest = crest_data_uri,
        house = team.house.as_str(),
        team_name = escape_html(&team.name),
        team_size = team.team_size,
        registered = team.registered_at.format("%B %d, %Y"),
        utr = escape_html(&team.utr_transaction_id),
    )
}

/// Build the downloadable ticket for an approved team. Returns the
/// attachment filename and the document body.
pub async fn generate_ticket(ctx: &Context, team_id: Uuid) -> Result<(String, String), ApiError> {
    let team = crate::db::schema::teams::table
        .find(team_id)
        .select(Team::as_select())
        .first::<Team>(&mut ctx.get_db_conn().await?)
        .await
        .optional()?
        .ok_or_else(|| ApiError::NotFound("Team not found".to_string()))?;

    if team.approval_status != ApprovalStatus::Approved {
        return Err(ApiError::Forbidden("Team is not approved yet".to_string()));
    }

    let members = crate::db::schema::members::table
        .filter(crate::db::schema::members::team_id.eq(team.id))
        .order(crate::db::schema::members::position.asc())
        .load::<Member>(&mut ctx.get_db_conn().await?)
        .await?;

    // A missing crest file degrades to an empty image, not an error.
    let crest_path = ctx.assets_dir().join(crest_filename(team.house));
    let crest_data_uri = match tokio::fs::read(&crest_path).await {
        Ok(bytes) => format!("data:image/png;base64,{}", BASE64_STANDARD.encode(bytes)),
        Err(err) => {
            tracing::debug!("crest image {} not readable: {err}", crest_path.display());
            String::new()
        }
    };

    let filename = format!("hackathon_ticket_{}.html", slugify!(&team.name, separator = "_"));
    Ok((filename, render_ticket(&team, &members, &crest_data_uri)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team() -> Team {
        Team {
            id: Uuid::nil(),
            name: "Dumbledore's <Army>".to_string(),
            house: House::Gryffindor,
            team_size: 2,
            utr_transaction_id: "UTR123".to_string(),
            payment_proof_path: None,
            approval_status: ApprovalStatus::Approved,
            selected_problem_statement_id: None,
            git_repo_url: None,
            registered_at: chrono::Utc::now(),
        }
    }

    fn member(name: &str, position: i32, is_leader: bool) -> Member {
        Member {
            id: Uuid::nil(),
            team_id: Uuid::nil(),
            name: name.to_string(),
            email: format!("member{position}@example.com"),
            phone: "1234567890".to_string(),
            college: "Hogwarts".to_string(),
            is_leader,
            position,
        }
    }

    #[test]
    fn test_ticket_lists_members_and_marks_leader() {
        let html = render_ticket(
            &team(),
            &[member("Harry", 1, true), member("Hermione", 2, false)],
            "data:image/png;base64,AAAA",
        );
        assert!(html.contains("Harry (Leader)"));
        assert!(html.contains("<li>Hermione</li>"));
        assert!(html.contains("data:image/png;base64,AAAA"));
        assert!(html.contains("Gryffindor"));
    }

    #[test]
    fn test_ticket_escapes_team_name() {
        let html = render_ticket(&team(), &[], "");
        assert!(html.contains("Dumbledore's &lt;Army&gt;"));
        assert!(!html.contains("<Army>"));
    }

    #[test]
    fn test_crest_filename_per_house() {
        assert_eq!(crest_filename(House::Slytherin), "slytherin.png");
        assert_eq!(crest_filename(House::Muggles), "muggles.png");
    }
}
