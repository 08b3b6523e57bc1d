use crate::{
    api::{attendance, leave, salary},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

// Per-route limiter; a rate of 0 falls back to one request per minute.
fn build_limiter(requests_per_min: u32) -> anyhow::Result<Governor<PeerIpKeyExtractor, NoOpMiddleware>> {
    let requests_per_min = requests_per_min.max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond((60_000 / requests_per_min as u64).max(1))
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow::anyhow!("invalid rate limit: {requests_per_min}/min"))?;
    Ok(Governor::new(&cfg))
}

pub struct Limiters {
    login: Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>,
    register: Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>,
    refresh: Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>,
    protected: Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>,
}

impl Limiters {
    /// Built once at startup so every worker shares the same buckets.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            login: Arc::new(build_limiter(config.rate_login_per_min)?),
            register: Arc::new(build_limiter(config.rate_register_per_min)?),
            refresh: Arc::new(build_limiter(config.rate_refresh_per_min)?),
            protected: Arc::new(build_limiter(config.rate_protected_per_min)?),
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &Limiters) {
    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(limiters.register.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(limiters.refresh.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(limiters.protected.clone())
            .service(handlers::me)
            .service(
                web::scope("/attendance")
                    .service(
                        web::resource("")
                            .route(web::get().to(attendance::list_attendance)),
                    )
                    .service(web::resource("/check-in").route(web::post().to(attendance::check_in)))
                    .service(
                        web::resource("/check-out").route(web::put().to(attendance::check_out)),
                    )
                    .service(
                        web::resource("/mark").route(web::post().to(attendance::mark_attendance)),
                    )
                    .service(
                        web::resource("/summary")
                            .route(web::get().to(attendance::attendance_summary)),
                    )
                    .service(
                        web::resource("/import")
                            .route(web::post().to(attendance::import_attendance)),
                    )
                    // /attendance/{id}
                    .service(
                        web::resource("/{id}").route(web::put().to(attendance::update_attendance)),
                    ),
            )
            .service(
                web::resource("/leave-types")
                    .route(web::get().to(leave::list_leave_types))
                    .route(web::post().to(leave::create_leave_type)),
            )
            .service(
                web::scope("/leave")
                    .service(
                        web::resource("")
                            .route(web::get().to(leave::leave_list))
                            .route(web::post().to(leave::create_leave)),
                    )
                    // must come before /{id}
                    .service(
                        web::resource("/balances")
                            .route(web::get().to(leave::list_balances))
                            .route(web::post().to(leave::allocate_balance)),
                    )
                    .service(web::resource("/{id}").route(web::get().to(leave::get_leave)))
                    .service(
                        web::resource("/{id}/approve").route(web::put().to(leave::approve_leave)),
                    )
                    .service(
                        web::resource("/{id}/reject").route(web::put().to(leave::reject_leave)),
                    ),
            )
            .service(
                web::scope("/salary")
                    .service(
                        web::resource("")
                            .route(web::post().to(salary::save_salary))
                            .route(web::get().to(salary::list_salaries)),
                    )
                    .service(
                        web::resource("/calculate").route(web::post().to(salary::calculate_salary)),
                    )
                    .service(web::resource("/preview").route(web::get().to(salary::preview_salary)))
                    .service(web::resource("/ledger").route(web::get().to(salary::workday_ledger)))
                    .service(web::resource("/{id}").route(web::get().to(salary::get_salary))),
            ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test};

    fn config() -> Config {
        Config::from_lookup(|key| match key {
            "SERVER_ADDR" => Some("127.0.0.1:0".into()),
            "DATABASE_URL" => Some("mysql://localhost/unused".into()),
            "JWT_SECRET" => Some("test-secret".into()),
            _ => None,
        })
        .unwrap()
    }

    #[actix_web::test]
    async fn zero_rate_still_builds_a_limiter() {
        assert!(build_limiter(0).is_ok());
        assert!(build_limiter(100_000).is_ok());
    }

    #[actix_web::test]
    async fn protected_scope_rejects_missing_token() {
        let config = config();
        let limiters = Limiters::from_config(&config).unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(config.clone()))
                .configure(|cfg| configure(cfg, &config, &limiters)),
        )
        .await;

        for uri in ["/api/me", "/api/attendance/summary?year=2026&month=3", "/api/leave/balances"] {
            let req = test::TestRequest::get()
                .uri(uri)
                .peer_addr("127.0.0.1:4000".parse().unwrap())
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }
}
