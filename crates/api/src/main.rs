// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::{convert::Infallible, error::Error, net::SocketAddr};

use diesel::Connection;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::net::TcpListener;

use hackathon_api::api::{BaseContext, Context, router};
use hackathon_api::db;
use hackathon_api::db::models::NewAdmin;
use hackathon_api::email::Mailer;

type DbPool = diesel_async::pooled_connection::bb8::Pool<diesel_async::AsyncPgConnection>;

/// Make sure the configured admin credential row exists (and matches the
/// environment); warn loudly when there is no way to log in as an admin.
async fn bootstrap_admin(db_pool: &DbPool) -> Result<(), Box<dyn Error + Send + Sync>> {
    use hackathon_api::db::schema::admins;

    let mut conn = db_pool.get().await?;
    match (
        std::env::var("ADMIN_USERNAME").ok(),
        std::env::var("ADMIN_PASSWORD").ok(),
    ) {
        (Some(username), Some(password)) => {
            let password_hash =
                hackathon_api::api::handlers::sessions::hash_password(&password)?;
            diesel::insert_into(admins::table)
                .values(NewAdmin {
                    username: username.clone(),
                    password_hash: password_hash.clone(),
                })
                .on_conflict(admins::username)
                .do_update()
                .set(admins::password_hash.eq(password_hash))
                .execute(&mut conn)
                .await?;
            tracing::info!("Admin credential for {username} is up to date");
        }
        _ => {
            let admin_count: i64 = admins::table.count().get_result(&mut conn).await?;
            if admin_count == 0 {
                tracing::warn!(
                    "ADMIN_USERNAME/ADMIN_PASSWORD are not set and no admin exists; admin routes will be unusable"
                );
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "debug");
        }
    }
    tracing_subscriber::fmt::init();

    for var in &[
        "EMAIL_SMTP_SERVER",
        "EMAIL_SMTP_USERNAME",
        "EMAIL_SMTP_PASSWORD",
        "EMAIL_FROM_ADDRESS",
    ] {
        if std::env::var(var).is_err() {
            tracing::warn!(
                "Environment variable {var} is not set; approval emails will not be sent!"
            );
        }
    }

    let addr = std::env::var("BIND_ADDR")
        .ok()
        .and_then(|addr| addr.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0, 0, 0, 0, 0], 3000)));
    let listener = TcpListener::bind(addr).await?;

    let upload_dir =
        std::path::PathBuf::from(std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()));
    std::fs::create_dir_all(&upload_dir)?;
    let assets_dir =
        std::path::PathBuf::from(std::env::var("ASSETS_DIR").unwrap_or_else(|_| "assets".to_string()));

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    {
        let mut pg_connection = diesel::pg::PgConnection::establish(&database_url)
            .expect("Failed to connect to database for migrations");
        db::run_migrations(&mut pg_connection).expect("Failed to run database migrations");
    }

    let ctx = BaseContext {
        db_pool: {
            let manager =
                AsyncDieselConnectionManager::<diesel_async::AsyncPgConnection>::new(database_url);
            diesel_async::pooled_connection::bb8::Pool::builder()
                .build(manager)
                .await
                .expect("Failed to create DB connection pool")
        },
        mailer: Mailer::from_env(),
        upload_dir,
        assets_dir,
    };

    bootstrap_admin(&ctx.db_pool).await?;

    tracing::info!("Listening on http://{addr}");
    loop {
        let (stream, remote_addr) = listener.accept().await?;

        let io = TokioIo::new(stream);

        let ctx = ctx.clone();

        tokio::spawn(async move {
            let ctx = ctx.clone();

            if let Err(e) = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                .serve_connection(
                    io,
                    service_fn(move |req| {
                        let mut remote_ip = remote_addr.ip();

                        let is_private = match remote_ip {
                            std::net::IpAddr::V4(ipv4) => ipv4.is_private(),
                            std::net::IpAddr::V6(ipv6) => ipv6.is_unique_local(),
                        };

                        if is_private {
                            if let Some(xff) = req.headers().get("x-forwarded-for") {
                                if let Ok(xff_str) = xff.to_str() {
                                    for ip_str in xff_str.split(',') {
                                        if let Ok(ip) = ip_str.trim().parse::<std::net::IpAddr>() {
                                            let is_private = match ip {
                                                std::net::IpAddr::V4(ipv4) => ipv4.is_private(),
                                                std::net::IpAddr::V6(ipv6) => {
                                                    ipv6.is_unique_local()
                                                }
                                            };
                                            if !is_private {
                                                remote_ip = ip;
                                                break;
                                            }
                                        }
                                    }
                                }
                            }
                        }

                        let admin_token = req
                            .headers()
                            .get("authorization")
                            .and_then(|auth_header| {
                                let auth_str = auth_header.to_str().ok()?;
                                auth_str.strip_prefix("Bearer ").map(str::to_string)
                            })
                            .or_else(|| {
                                req.headers()
                                    .get("x-admin-token")
                                    .and_then(|token| token.to_str().ok())
                                    .map(str::to_string)
                            });

                        let ctx = Context::new(
                            ctx.clone(),
                            remote_ip,
                            req.headers()
                                .get("user-agent")
                                .and_then(|ua| ua.to_str().ok())
                                .unwrap_or("unknown")
                                .to_string(),
                            admin_token,
                        );

                        async move { Ok::<_, Infallible>(router::handle(ctx, req).await) }
                    }),
                )
                .await
            {
                tracing::error!("Error serving connection: {e}");
            }
        });
    }
}
