use crate::{
    api::{attendance, dashboard, employee},
    config::Config,
    error::AppError,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::web;
use tracing::{debug, warn};

fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = if requests_per_min == 0 {
        warn!("RATE_PER_MIN is 0, allowing one request per minute");
        1
    } else {
        requests_per_min
    };
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond((60_000 / requests_per_min as u64).max(1))
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .expect("rate limiter period and burst are non-zero");
    Governor::new(&cfg)
}

/// Mounts the API under the configured prefix behind a per-IP rate limit.
pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(build_limiter(config.rate_per_min))
            .configure(api_routes),
    );
}

/// Bodies that are not the expected JSON shape answer like any other
/// validation failure.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, req| {
        debug!(error = %err, path = %req.path(), "Rejected request body");
        AppError::validation("body", format!("Invalid request body: {err}")).into()
    })
}

pub fn api_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config());
    cfg.service(
        web::scope("/employees")
            // /employees
            .service(
                web::resource("")
                    .route(web::get().to(employee::list_employees))
                    .route(web::post().to(employee::create_employee)),
            )
            // /employees/{employee_id}
            .service(
                web::resource("/{employee_id}")
                    .route(web::delete().to(employee::delete_employee)),
            ),
    )
    .service(
        web::scope("/attendance")
            // /attendance
            .service(
                web::resource("")
                    .route(web::get().to(attendance::list_attendance))
                    .route(web::post().to(attendance::mark_attendance)),
            )
            // /attendance/today
            .service(web::resource("/today").route(web::get().to(attendance::today_attendance))),
    )
    .service(web::resource("/dashboard").route(web::get().to(dashboard::dashboard)));
}
