// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

pub mod approval;
pub mod members;
pub mod problem_statements;
pub mod registration;
pub mod reviews;
pub mod sessions;
pub mod settings;
pub mod sponsors;
pub mod teams;
pub mod ticket;

/// JSON handler result: status code plus the response payload. The router
/// injects the `success` flag and serializes.
pub type JsonResult = Result<(hyper::StatusCode, serde_json::Value), crate::api::ApiError>;
