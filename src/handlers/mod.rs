use axum::{
    http::{StatusCode, Uri},
    Json,
};

use crate::errors::RequestError;

mod feed;
mod groups;
mod messaging;
mod news;
mod notifications;
mod reviews;
mod social;
mod users;

pub use feed::*;
pub use groups::*;
pub use messaging::*;
pub use news::*;
pub use notifications::*;
pub use reviews::*;
pub use social::*;
pub use users::*;

type JsonResult<T> = Result<Json<T>, RequestError>;
type EmptyResult = Result<StatusCode, RequestError>;

// ----------------- Helper Handlers -----------------
pub async fn alive() -> &'static str {
    "alive"
}

pub async fn not_found(uri: Uri) -> Result<(), (StatusCode, String)> {
    Err((
        StatusCode::NOT_FOUND,
        format!("URL {} provided was not found", uri),
    ))
}
