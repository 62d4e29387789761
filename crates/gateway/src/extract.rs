//! Request extractors that reject with the service error envelope

use axum::extract::FromRequest;
use peerdesk_common::errors::AppError;

/// JSON body whose deserialization failures surface as `AppError::Validation`
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
