use actix_web::{HttpRequest, HttpResponse, get, web};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};

use crate::{
    auth::{
        auth::AuthUser,
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    error::{AppError, is_duplicate_key},
    model::role::Role,
    models::{Claims, LoginReqDto, RegisterReq, TokenPair, TokenType, UserSql, normalize_email},
};

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Issues an access token plus a stored refresh token.
async fn issue_token_pair(
    pool: &MySqlPool,
    config: &Config,
    user_id: u64,
    email: &str,
    role: u8,
) -> Result<TokenPair, AppError> {
    let access_token = generate_access_token(
        user_id,
        email,
        role,
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(|e| AppError::Internal(e.into()))?;

    let (refresh_token, refresh_claims) = generate_refresh_token(
        user_id,
        email,
        role,
        &config.jwt_secret,
        config.refresh_token_ttl,
    )
    .map_err(|e| AppError::Internal(e.into()))?;

    debug!(user_id, jti = %refresh_claims.jti, "Storing refresh token");

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(user_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool)
    .await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Decodes a refresh token from the Authorization header.
fn refresh_claims(req: &HttpRequest, config: &Config) -> Option<Claims> {
    let claims = verify_token(bearer_token(req)?, &config.jwt_secret).ok()?;
    (claims.token_type == TokenType::Refresh).then_some(claims)
}

/// User registration handler. New accounts are always employees; HR and
/// admin roles are granted directly in the database.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "User registered"),
        (status = 400, description = "Email or password missing"),
        (status = 409, description = "Email already registered")
    ),
    tag = "Auth"
)]
pub async fn register(
    user: web::Json<RegisterReq>,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let email = normalize_email(&user.email);

    if email.is_empty() || !email.contains('@') || user.password.is_empty() {
        return Err(AppError::BadRequest(
            "A valid email and a password are required".into(),
        ));
    }

    let hashed = hash_password(&user.password)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("password hashing failed: {e}")))?;

    let result = sqlx::query(
        r#"INSERT INTO users (email, password, role_id, full_name) VALUES (?, ?, ?, ?)"#,
    )
    .bind(&email)
    .bind(hashed)
    .bind(Role::Employee.id())
    .bind(user.full_name.as_deref())
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(_) => {
            info!(email = %email, "User registered");
            Ok(HttpResponse::Created().json(json!({
                "message": "User registered successfully"
            })))
        }
        Err(e) if is_duplicate_key(&e) => {
            Err(AppError::Conflict("Email already registered".into()))
        }
        Err(e) => Err(e.into()),
    }
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, body = TokenPair),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(email = %user.email)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    info!("Login request received");

    if user.email.trim().is_empty() || user.password.is_empty() {
        return Err(AppError::BadRequest("Email and password required".into()));
    }

    let email = normalize_email(&user.email);

    let db_user = sqlx::query_as::<_, UserSql>(
        r#"
        SELECT id, email, password, role_id, is_active
        FROM users
        WHERE email = ?
        "#,
    )
    .bind(&email)
    .fetch_optional(pool.get_ref())
    .await?;

    let Some(db_user) = db_user.filter(|u| u.is_active) else {
        info!("Invalid credentials: unknown or inactive user");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    let tokens = issue_token_pair(
        pool.get_ref(),
        &config,
        db_user.id,
        &db_user.email,
        db_user.role_id,
    )
    .await?;

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        // not worth failing the login over
        error!(error = %e, "Failed to update last_login_at");
    }

    info!("Login successful");

    Ok(HttpResponse::Ok().json(tokens))
}

#[get("/me")]
pub async fn me(auth: AuthUser) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "user_id": auth.user_id,
        "email": auth.email,
        "role": auth.role.id(),
    }))
}

/// Rotates a refresh token: the presented one is revoked and a new pair
/// is issued.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, body = TokenPair),
        (status = 401, description = "Missing, invalid or revoked refresh token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let claims = refresh_claims(&req, &config)
        .ok_or_else(|| AppError::Unauthorized("Invalid refresh token".into()))?;

    // revoke-if-live doubles as the lookup, so a token can be rotated once
    let revoked = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = TRUE
        WHERE jti = ? AND user_id = ? AND revoked = FALSE
        "#,
    )
    .bind(&claims.jti)
    .bind(claims.user_id)
    .execute(pool.get_ref())
    .await?;

    if revoked.rows_affected() == 0 {
        return Err(AppError::Unauthorized("Refresh token revoked".into()));
    }

    let tokens = issue_token_pair(
        pool.get_ref(),
        &config,
        claims.user_id,
        &claims.sub,
        claims.role,
    )
    .await?;

    Ok(HttpResponse::Ok().json(tokens))
}

/// Revokes the presented refresh token. Always answers 204.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Logged out")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> HttpResponse {
    if let Some(claims) = refresh_claims(&req, &config) {
        if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
            .bind(&claims.jti)
            .execute(pool.get_ref())
            .await
        {
            error!(error = %e, "Failed to revoke refresh token");
        }
    }

    HttpResponse::NoContent().finish()
}
