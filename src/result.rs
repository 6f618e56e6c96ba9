use axum::{Json, http::StatusCode};
use serde::Serialize;

use crate::{common::ApiResponse, error::AppError, utils::success_to_api_response};

/// 处理函数的统一返回类型
pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), AppError>;

pub fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, success_to_api_response(data)))
}

pub fn created<T: Serialize>(data: T) -> ApiResult<T> {
    Ok((StatusCode::CREATED, success_to_api_response(data)))
}
