//! REST API module.
//!
//! Handlers are thin: decode, call a usecase, encode. Failures are
//! [`AppError`]s rendered through the status table, except on the auth
//! resource which answers every failure with 400.

mod auth;
mod places;
mod purchases;
mod telegram;
mod users;

pub use auth::*;
pub use places::*;
pub use purchases::*;
pub use telegram::*;
pub use users::*;

use axum::{
    extract::{FromRequest, FromRequestParts},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::errors::AppError;

/// Response type of the non-auth handlers.
pub type ApiResult<T> = Result<T, AppError>;

/// JSON body whose rejection is an [`AppError`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Query string whose rejection is an [`AppError`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct Query<T>(pub T);

/// Plain acknowledgement body.
pub const OK: &str = "OK";
