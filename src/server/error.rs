use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::Error;

/// 请求本身有问题
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("鉴权失败")]
    Unauthorized,
    #[error("{0}")]
    BadRequest(String),
}

/// API错误类型
pub struct AppError(pub anyhow::Error);

pub type Result<T, E = AppError> = std::result::Result<T, E>;

impl AppError {
    fn status(&self) -> StatusCode {
        if let Some(e) = self.0.downcast_ref::<Error>() {
            return match e {
                Error::NotFound(_) => StatusCode::NOT_FOUND,
                Error::Cancelled => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
        }
        match self.0.downcast_ref::<RequestError>() {
            Some(RequestError::Unauthorized) => StatusCode::UNAUTHORIZED,
            Some(RequestError::BadRequest(_)) => StatusCode::BAD_REQUEST,
            None => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match status {
            StatusCode::INTERNAL_SERVER_ERROR => {
                log::error!("请求处理失败: {:?}", self.0);
                (status, format!("Something went wrong: {}", self.0)).into_response()
            }
            _ => (status, self.0.to_string()).into_response(),
        }
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::from(Error::NotFound(1)).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::from(Error::Cancelled).status(), StatusCode::CONFLICT);
        assert_eq!(AppError::from(RequestError::Unauthorized).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::from(RequestError::BadRequest("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
