use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, ResponseError,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};

use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::AppError;

pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("App config missing")))?;

    let header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    match AuthUser::from_bearer(header, &config.jwt_secret) {
        Ok(user) => {
            tracing::debug!(user = %user.email, path = %req.path(), "Authenticated request");
            req.extensions_mut().insert(user);
            next.call(req).await
        }
        Err(e) => {
            let resp = e.error_response();
            Ok(req.into_response(resp))
        }
    }
}
