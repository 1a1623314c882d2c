// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::http::request::Parts;
use hyper::{Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use uuid::Uuid;

use crate::api::handlers;
use crate::api::handlers::settings::{LOGIN_ENABLED, REGISTRATION_ENABLED, TEAMS_ENABLED};
use crate::api::{ApiError, Context};

fn base_response(status: StatusCode, content_type: &'static str, body: Vec<u8>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static(content_type),
    );
    headers.insert(
        hyper::header::ACCESS_CONTROL_ALLOW_ORIGIN,
        hyper::header::HeaderValue::from_static("*"),
    );
    headers.insert(
        hyper::header::ACCESS_CONTROL_ALLOW_HEADERS,
        hyper::header::HeaderValue::from_static("Content-Type,Authorization,X-Admin-Token"),
    );
    headers.insert(
        hyper::header::ACCESS_CONTROL_ALLOW_METHODS,
        hyper::header::HeaderValue::from_static("GET,PUT,POST,DELETE,OPTIONS"),
    );
    response
}

fn json_response(status: StatusCode, value: &serde_json::Value) -> Response<Full<Bytes>> {
    let body = serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec());
    base_response(status, "application/json", body)
}

/// Wrap a handler payload in the `{"success": true, ...}` envelope.
fn success_response(
    (status, mut value): (StatusCode, serde_json::Value),
) -> Response<Full<Bytes>> {
    if let serde_json::Value::Object(map) = &mut value {
        map.insert("success".to_string(), json!(true));
    }
    json_response(status, &value)
}

fn error_response(err: &ApiError) -> Response<Full<Bytes>> {
    json_response(err.status(), &json!({ "error": err.public_message() }))
}

fn attachment_response(
    content_type: &'static str,
    filename: &str,
    body: Vec<u8>,
) -> Response<Full<Bytes>> {
    let mut response = base_response(StatusCode::OK, content_type, body);
    if let Ok(disposition) =
        hyper::header::HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
    {
        response
            .headers_mut()
            .insert(hyper::header::CONTENT_DISPOSITION, disposition);
    }
    response
}

async fn parse_json<T: DeserializeOwned>(body: Incoming) -> Result<T, ApiError> {
    let bytes = body
        .collect()
        .await
        .map_err(|err| ApiError::Validation(format!("Failed to read request body: {err}")))?
        .to_bytes();
    serde_json::from_slice(&bytes)
        .map_err(|err| ApiError::Validation(format!("Invalid JSON body: {err}")))
}

fn parse_uuid(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::Validation("Invalid identifier".to_string()))
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        match bytes[index] {
            b'+' => {
                decoded.push(b' ');
                index += 1;
            }
            b'%' if index + 2 < bytes.len() => {
                match (hex_value(bytes[index + 1]), hex_value(bytes[index + 2])) {
                    (Some(high), Some(low)) => {
                        decoded.push(high << 4 | low);
                        index += 3;
                    }
                    _ => {
                        decoded.push(b'%');
                        index += 1;
                    }
                }
            }
            other => {
                decoded.push(other);
                index += 1;
            }
        }
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

fn query_param(query: Option<&str>, key: &str) -> Option<String> {
    for pair in query?.split('&') {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        if name == key {
            return Some(percent_decode(value));
        }
    }
    None
}

pub async fn handle(ctx: Context, req: Request<Incoming>) -> Response<Full<Bytes>> {
    if req.method() == Method::OPTIONS {
        return base_response(StatusCode::NO_CONTENT, "text/plain", Vec::new());
    }

    let (parts, body) = req.into_parts();
    let Some(rest) = parts.uri.path().strip_prefix("/api") else {
        return error_response(&ApiError::NotFound("Not found".to_string()));
    };
    let segments: Vec<&str> = rest
        .trim_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();

    match dispatch(&ctx, &parts, &segments, body).await {
        Ok(response) => response,
        Err(err) => {
            if err.status().is_server_error() {
                tracing::error!("{} {} failed: {err}", parts.method, parts.uri.path());
            } else {
                tracing::debug!("{} {} rejected: {err}", parts.method, parts.uri.path());
            }
            error_response(&err)
        }
    }
}

async fn dispatch(
    ctx: &Context,
    parts: &Parts,
    segments: &[&str],
    body: Incoming,
) -> Result<Response<Full<Bytes>>, ApiError> {
    let query = parts.uri.query();

    Ok(match (&parts.method, segments) {
        (&Method::POST, ["register"]) => success_response(
            handlers::registration::register_team(ctx, parse_json(body).await?).await?,
        ),
        (&Method::GET, ["teams"]) => success_response(
            handlers::teams::list_teams(
                ctx,
                query_param(query, "house"),
                query_param(query, "search"),
            )
            .await?,
        ),
        (&Method::GET, ["teams", team_id]) => {
            success_response(handlers::teams::get_team(ctx, parse_uuid(team_id)?).await?)
        }
        (&Method::POST, ["login"]) => {
            success_response(handlers::sessions::login(ctx, parse_json(body).await?).await?)
        }
        (&Method::POST, ["logout"]) => success_response(handlers::sessions::logout(ctx).await?),
        (&Method::POST, ["select-problem-statement"]) => success_response(
            handlers::problem_statements::select_statement(ctx, parse_json(body).await?).await?,
        ),
        (&Method::GET, ["problem-statements"]) => success_response(
            handlers::problem_statements::list_statements(
                ctx,
                query_param(query, "house"),
                query_param(query, "domain"),
            )
            .await?,
        ),
        (&Method::GET, ["leaderboard"]) => {
            success_response(handlers::reviews::leaderboard(ctx).await?)
        }
        (&Method::GET, ["sponsors"]) => {
            success_response(handlers::sponsors::list_sponsors(ctx).await?)
        }
        (&Method::GET, ["uploads", filename]) => {
            let bytes = crate::upload::read_stored(ctx.upload_dir(), filename).await?;
            base_response(
                StatusCode::OK,
                crate::upload::content_type_for(filename),
                bytes,
            )
        }
        (&Method::GET, ["generate-ticket", team_id]) => {
            let (filename, html) =
                handlers::ticket::generate_ticket(ctx, parse_uuid(team_id)?).await?;
            attachment_response("text/html; charset=utf-8", &filename, html.into_bytes())
        }

        /* ===== admin routes ===== */
        (&Method::GET, ["admin", "pending-teams"]) => {
            success_response(handlers::teams::pending_teams(ctx).await?)
        }
        (&Method::GET, ["admin", "teams"]) => {
            success_response(handlers::teams::approved_team_names(ctx).await?)
        }
        (&Method::GET, ["admin", "all-teams"]) => {
            success_response(handlers::teams::all_teams_with_members(ctx).await?)
        }
        (&Method::POST, ["admin", "approve-team", team_id]) => {
            success_response(handlers::approval::approve_team(ctx, parse_uuid(team_id)?).await?)
        }
        (&Method::POST, ["admin", "reject-team", team_id]) => {
            success_response(handlers::approval::reject_team(ctx, parse_uuid(team_id)?).await?)
        }
        (&Method::POST, ["admin", "teams", team_id, "members"]) => success_response(
            handlers::members::add_member(ctx, parse_uuid(team_id)?, parse_json(body).await?)
                .await?,
        ),
        (&Method::DELETE, ["admin", "teams", team_id, "members", member_id]) => {
            success_response(
                handlers::members::remove_member(
                    ctx,
                    parse_uuid(team_id)?,
                    parse_uuid(member_id)?,
                )
                .await?,
            )
        }
        (&Method::POST, ["admin", "problem-statements"]) => success_response(
            handlers::problem_statements::create_statement(ctx, parse_json(body).await?).await?,
        ),
        (&Method::DELETE, ["admin", "problem-statements", statement_id]) => success_response(
            handlers::problem_statements::delete_statement(ctx, parse_uuid(statement_id)?).await?,
        ),
        (&Method::GET, ["admin", "problem-statements", statement_id, "teams"]) => {
            success_response(
                handlers::problem_statements::teams_for_statement(ctx, parse_uuid(statement_id)?)
                    .await?,
            )
        }
        (&Method::POST, ["admin", "review-marks"]) => success_response(
            handlers::reviews::add_review_marks(ctx, parse_json(body).await?).await?,
        ),
        (&Method::GET, ["admin", "review-marks", "export"]) => {
            success_response(handlers::reviews::export::export_review_marks(ctx).await?)
        }
        (&Method::GET, ["admin", "statistics"]) => {
            success_response(handlers::teams::statistics(ctx).await?)
        }
        (&Method::GET, ["admin", "registration-toggle"]) => {
            success_response(handlers::settings::get_toggle(ctx, REGISTRATION_ENABLED).await?)
        }
        (&Method::POST, ["admin", "registration-toggle"]) => success_response(
            handlers::settings::set_toggle(ctx, REGISTRATION_ENABLED, parse_json(body).await?)
                .await?,
        ),
        (&Method::GET, ["admin", "login-toggle"]) => {
            success_response(handlers::settings::get_toggle(ctx, LOGIN_ENABLED).await?)
        }
        (&Method::POST, ["admin", "login-toggle"]) => success_response(
            handlers::settings::set_toggle(ctx, LOGIN_ENABLED, parse_json(body).await?).await?,
        ),
        (&Method::GET, ["admin", "teams-toggle"]) => {
            success_response(handlers::settings::get_toggle(ctx, TEAMS_ENABLED).await?)
        }
        (&Method::POST, ["admin", "teams-toggle"]) => success_response(
            handlers::settings::set_toggle(ctx, TEAMS_ENABLED, parse_json(body).await?).await?,
        ),
        (&Method::POST, ["admin", "sponsors"]) => success_response(
            handlers::sponsors::create_sponsor(ctx, parse_json(body).await?).await?,
        ),
        (&Method::DELETE, ["admin", "sponsors", sponsor_id]) => success_response(
            handlers::sponsors::delete_sponsor(ctx, parse_uuid(sponsor_id)?).await?,
        ),

        _ => return Err(ApiError::NotFound("Not found".to_string())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_decode() {
        assert_eq!(percent_decode("Dumbledore%27s+Army"), "Dumbledore's Army");
        assert_eq!(percent_decode("a%20b"), "a b");
        assert_eq!(percent_decode("plain"), "plain");
        // A dangling escape is passed through untouched.
        assert_eq!(percent_decode("50%"), "50%");
    }

    #[test]
    fn test_query_param() {
        let query = Some("house=Gryffindor&search=dumble+dore");
        assert_eq!(query_param(query, "house").as_deref(), Some("Gryffindor"));
        assert_eq!(query_param(query, "search").as_deref(), Some("dumble dore"));
        assert_eq!(query_param(query, "missing"), None);
        assert_eq!(query_param(None, "house"), None);
    }

    #[test]
    fn test_success_envelope_is_injected() {
        let response = success_response((StatusCode::CREATED, json!({ "team_id": 1 })));
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
