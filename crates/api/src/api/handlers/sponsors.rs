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
use crate::api::{ApiError, Context};
use crate::db::models::{NewSponsor, Sponsor};
use crate::upload::FilePayload;

fn sponsor_json(sponsor: &Sponsor) -> serde_json::Value {
    json!({
        "id": sponsor.id,
        "name": sponsor.name,
        "logo_path": sponsor.logo_path,
        "redirect_url": sponsor.redirect_url,
        "display_order": sponsor.display_order,
    })
}

#[derive(Deserialize, Debug)]
pub struct CreateSponsorRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub display_order: i32,
    pub logo: FilePayload,
}

pub async fn create_sponsor(ctx: &Context, request: CreateSponsorRequest) -> JsonResult {
    ctx.require_admin().await?;

    let name = request.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::Validation("Sponsor name is required".to_string()));
    }
    let redirect_url = request
        .redirect_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string);

    let logo_path = crate::upload::store(ctx.upload_dir(), &request.logo).await?;

    let sponsor = diesel::insert_into(crate::db::schema::sponsors::table)
        .values(NewSponsor {
            name,
            logo_path,
            redirect_url,
            display_order: request.display_order,
        })
        .returning(Sponsor::as_returning())
        .get_result::<Sponsor>(&mut ctx.get_db_conn().await?)
        .await?;

    Ok((
        StatusCode::CREATED,
        json!({
            "message": "Sponsor added successfully",
            "sponsor": sponsor_json(&sponsor),
        }),
    ))
}

pub async fn list_sponsors(ctx: &Context) -> JsonResult {
    use crate::db::schema::sponsors::dsl::*;

    let records = sponsors
        .order((display_order.asc(), created_at.asc()))
        .select(Sponsor::as_select())
        .load::<Sponsor>(&mut ctx.get_db_conn().await?)
        .await?;

    Ok((
        StatusCode::OK,
        json!({ "sponsors": records.iter().map(sponsor_json).collect::<Vec<_>>() }),
    ))
}

pub async fn delete_sponsor(ctx: &Context, sponsor_id: Uuid) -> JsonResult {
    ctx.require_admin().await?;

    let deleted = diesel::delete(crate::db::schema::sponsors::table.find(sponsor_id))
        .execute(&mut ctx.get_db_conn().await?)
        .await?;
    if deleted == 0 {
        return Err(ApiError::NotFound("Sponsor not found".to_string()));
    }

    Ok((
        StatusCode::OK,
        json!({ "message": "Sponsor deleted successfully" }),
    ))
}
