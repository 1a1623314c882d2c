use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use hyper::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::api::handlers::JsonResult;
use crate::api::{ApiError, Context};
use crate::db::models::NewAdminSetting;
use crate::db::schema::admin_settings;

pub const REGISTRATION_ENABLED: &str = "registration_enabled";
pub const LOGIN_ENABLED: &str = "login_enabled";
pub const TEAMS_ENABLED: &str = "teams_enabled";

fn value_is_enabled(value: Option<&str>) -> bool {
    value.is_some_and(|value| value.eq_ignore_ascii_case("true"))
}

/// Toggles are read from the settings table at the start of every gated
/// workflow; nothing is cached in-process, so a flip takes effect on the
/// next request.
pub async fn setting_enabled(ctx: &Context, key: &str) -> Result<bool, ApiError> {
    let value = admin_settings::table
        .find(key)
        .select(admin_settings::value)
        .first::<String>(&mut ctx.get_db_conn().await?)
        .await
        .optional()?;
    Ok(value_is_enabled(value.as_deref()))
}

fn toggle_label(key: &str) -> &'static str {
    match key {
        REGISTRATION_ENABLED => "Registration",
        LOGIN_ENABLED => "Login",
        _ => "Team listing",
    }
}

#[derive(Deserialize, Debug)]
pub struct ToggleRequest {
    #[serde(default)]
    pub enabled: bool,
}

pub async fn get_toggle(ctx: &Context, key: &str) -> JsonResult {
    ctx.require_admin().await?;
    let enabled = setting_enabled(ctx, key).await?;
    Ok((StatusCode::OK, json!({ "enabled": enabled })))
}

pub async fn set_toggle(ctx: &Context, key: &str, request: ToggleRequest) -> JsonResult {
    ctx.require_admin().await?;

    diesel::insert_into(admin_settings::table)
        .values(NewAdminSetting {
            key: key.to_string(),
            value: request.enabled.to_string(),
        })
        .on_conflict(admin_settings::key)
        .do_update()
        .set((
            admin_settings::value.eq(request.enabled.to_string()),
            admin_settings::updated_at.eq(chrono::Utc::now()),
        ))
        .execute(&mut ctx.get_db_conn().await?)
        .await?;

    let state = if request.enabled { "enabled" } else { "disabled" };
    Ok((
        StatusCode::OK,
        json!({
            "enabled": request.enabled,
            "message": format!("{} is now {state}", toggle_label(key)),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_is_enabled() {
        assert!(value_is_enabled(Some("true")));
        assert!(value_is_enabled(Some("TRUE")));
        assert!(!value_is_enabled(Some("false")));
        assert!(!value_is_enabled(Some("yes")));
        assert!(!value_is_enabled(None));
    }
}
