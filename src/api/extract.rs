use axum::extract::FromRequest;

use crate::error::AppError;

/// `Json` whose rejection is an `AppError`, so malformed bodies get a JSON error
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);
