// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::net::IpAddr;
use std::path::PathBuf;

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::db::models::Admin;

pub mod error;
pub mod handlers;
pub mod router;

pub use error::ApiError;

/// State shared by every connection: the database pool, the optional SMTP
/// mailer and the on-disk directories for uploads and bundled assets.
#[derive(Clone)]
pub struct BaseContext {
    pub db_pool: diesel_async::pooled_connection::bb8::Pool<diesel_async::AsyncPgConnection>,
    pub mailer: Option<crate::email::Mailer>,
    pub upload_dir: PathBuf,
    pub assets_dir: PathBuf,
}

/// Per-request context: shared state plus what the connection told us about
/// the caller. The admin token is resolved lazily so unauthenticated routes
/// never touch the sessions table.
pub struct Context {
    base: BaseContext,
    ip: IpAddr,
    user_agent: String,
    admin_token: Option<String>,
}

impl Context {
    pub fn new(
        base: BaseContext,
        ip: IpAddr,
        user_agent: String,
        admin_token: Option<String>,
    ) -> Self {
        Self {
            base,
            ip,
            user_agent,
            admin_token,
        }
    }

    pub async fn get_db_conn(
        &self,
    ) -> Result<
        diesel_async::pooled_connection::bb8::PooledConnection<'_, diesel_async::AsyncPgConnection>,
        ApiError,
    > {
        Ok(self.base.db_pool.get().await?)
    }

    /// Single authorization guard for admin-only routes. Accepts a session
    /// token presented either as `Authorization: Bearer <token>` or as the
    /// explicit `X-Admin-Token` header; both resolve against the sessions
    /// table, nothing is cached in-process.
    pub async fn require_admin(&self) -> Result<Admin, ApiError> {
        let token = self
            .admin_token
            .as_deref()
            .ok_or_else(|| ApiError::Unauthorized("Admin authentication required".to_string()))?;

        let admin = crate::db::schema::sessions::table
            .inner_join(crate::db::schema::admins::table)
            .filter(crate::db::schema::sessions::session_token.eq(token))
            .filter(crate::db::schema::sessions::expires_at.gt(chrono::Utc::now()))
            .select(Admin::as_select())
            .first::<Admin>(&mut self.get_db_conn().await?)
            .await
            .optional()?;

        admin.ok_or_else(|| ApiError::Unauthorized("Admin session is invalid or expired".to_string()))
    }

    pub fn get_ip(&self) -> &IpAddr {
        &self.ip
    }

    pub fn get_user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn admin_token(&self) -> Option<&str> {
        self.admin_token.as_deref()
    }

    pub fn upload_dir(&self) -> &PathBuf {
        &self.base.upload_dir
    }

    pub fn assets_dir(&self) -> &PathBuf {
        &self.base.assets_dir
    }

    pub fn mailer(&self) -> Option<&crate::email::Mailer> {
        self.base.mailer.as_ref()
    }
}
