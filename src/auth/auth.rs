use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::AppError;
use crate::model::role::Role;
use crate::models::TokenType;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    /// Resolves the bearer token of a request into a user.
    pub fn from_bearer(header: Option<&str>, secret: &str) -> Result<Self, AppError> {
        let token = header
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::Unauthorized("Missing token".into()))?;

        let claims = verify_token(token, secret)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;

        if claims.token_type != TokenType::Access {
            return Err(AppError::Unauthorized("Access token required".into()));
        }

        let role = Role::from_id(claims.role)
            .ok_or_else(|| AppError::Unauthorized("Invalid role".into()))?;

        Ok(AuthUser {
            user_id: claims.user_id,
            email: claims.sub,
            role,
        })
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin only".into()))
        }
    }

    pub fn require_hr_or_admin(&self) -> Result<(), AppError> {
        if self.is_hr_or_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("HR/Admin only".into()))
        }
    }

    /// Employees may only look at their own records.
    pub fn require_self_or_hr(&self, email: &str) -> Result<(), AppError> {
        if self.is_hr_or_admin() || self.email.eq_ignore_ascii_case(email) {
            Ok(())
        } else {
            Err(AppError::Forbidden("Not allowed to access another user's records".into()))
        }
    }

    pub fn is_hr_or_admin(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Hr)
    }
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // already resolved by auth_middleware on protected scopes
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let Some(config) = req.app_data::<Data<Config>>() else {
            return ready(Err(AppError::Internal(anyhow::anyhow!("Config missing"))));
        };

        let header = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok());

        ready(AuthUser::from_bearer(header, &config.jwt_secret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{generate_access_token, generate_refresh_token};

    fn bearer(token: &str) -> String {
        format!("Bearer {token}")
    }

    #[test]
    fn resolves_access_token() {
        let token = generate_access_token(3, "hr@company.com", 2, "secret", 60).unwrap();
        let user = AuthUser::from_bearer(Some(&bearer(&token)), "secret").unwrap();
        assert_eq!(user.email, "hr@company.com");
        assert_eq!(user.role, Role::Hr);
        assert!(user.require_hr_or_admin().is_ok());
        assert!(user.require_admin().is_err());
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let (token, _) = generate_refresh_token(3, "hr@company.com", 2, "secret", 60).unwrap();
        assert!(matches!(
            AuthUser::from_bearer(Some(&bearer(&token)), "secret"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn missing_or_malformed_header() {
        assert!(AuthUser::from_bearer(None, "secret").is_err());
        assert!(AuthUser::from_bearer(Some("Token abc"), "secret").is_err());
    }

    #[test]
    fn employees_only_see_themselves() {
        let user = AuthUser {
            user_id: 1,
            email: "jane@company.com".into(),
            role: Role::Employee,
        };
        assert!(!user.is_hr_or_admin());
        assert!(user.require_self_or_hr("Jane@Company.com").is_ok());
        assert!(user.require_self_or_hr("bob@company.com").is_err());
    }
}
