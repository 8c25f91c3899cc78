use crate::{
    api::{attendance, contract, invoice, job_application, payment, preferences, project, task, worker},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond((60_000 / requests_per_min as u64).max(1))
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .expect("period and burst are non-zero");
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            // admin token checked by the handler
            .service(
                web::resource("/register")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );
    cfg.service(
        web::resource("/applications")
            .wrap(login_limiter)
            .route(web::post().to(job_application::submit_application)),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter)
            .service(
                web::scope("/workers")
                    .service(
                        web::resource("")
                            .route(web::post().to(worker::create_worker))
                            .route(web::get().to(worker::list_workers)),
                    )
                    .service(
                        web::resource("/{worker_id}")
                            .route(web::get().to(worker::get_worker))
                            .route(web::put().to(worker::update_worker)),
                    )
                    .service(
                        web::resource("/{worker_id}/contracts")
                            .route(web::get().to(contract::list_worker_contracts)),
                    ),
            )
            .service(
                web::scope("/projects")
                    .service(
                        web::resource("")
                            .route(web::post().to(project::create_project))
                            .route(web::get().to(project::list_projects)),
                    )
                    .service(
                        web::resource("/{project_id}")
                            .route(web::delete().to(project::archive_project)),
                    )
                    .service(
                        web::resource("/{project_id}/towers")
                            .route(web::post().to(project::create_tower)),
                    ),
            )
            .service(web::resource("/towers/{tower_id}/floors").route(web::post().to(project::create_floor)))
            .service(
                web::resource("/floors/{floor_id}/apartments")
                    .route(web::post().to(project::create_apartment)),
            )
            .service(
                web::scope("/contracts")
                    .service(web::resource("").route(web::post().to(contract::create_contract)))
                    // before /{contract_id}/...
                    .service(web::resource("/rate").route(web::get().to(contract::resolve_rate)))
                    .service(
                        web::resource("/{contract_id}/status")
                            .route(web::put().to(contract::change_contract_status)),
                    ),
            )
            .service(
                web::scope("/tasks")
                    .service(web::resource("").route(web::post().to(task::create_task)))
                    .service(
                        web::resource("/{task_id}/status")
                            .route(web::put().to(task::update_task_status)),
                    )
                    .service(
                        web::resource("/{task_id}/assignments")
                            .route(web::get().to(task::list_assignments))
                            .route(web::post().to(task::assign_worker)),
                    )
                    .service(
                        web::resource("/{task_id}/assignments/{worker_id}")
                            .route(web::delete().to(task::remove_worker)),
                    )
                    .service(
                        web::resource("/{task_id}/distribution")
                            .route(web::put().to(task::adjust_distribution)),
                    ),
            )
            .service(
                web::resource("/attendance")
                    .route(web::put().to(attendance::mark_attendance))
                    .route(web::get().to(attendance::list_attendance)),
            )
            .service(
                web::scope("/payments")
                    .service(web::resource("/day/quote").route(web::get().to(payment::quote_day_payment)))
                    .service(web::resource("/day").route(web::post().to(payment::process_day_payment)))
                    .service(web::resource("/task").route(web::post().to(payment::process_task_payment)))
                    .service(web::resource("/custom").route(web::post().to(payment::record_custom_payment)))
                    .service(web::resource("/pending").route(web::get().to(payment::pending_summary)))
                    .service(web::resource("/history").route(web::get().to(payment::payment_history))),
            )
            .service(
                web::scope("/invoices")
                    .service(web::resource("").route(web::get().to(invoice::list_invoices)))
                    .service(web::resource("/extract").route(web::post().to(invoice::extract_invoice))),
            )
            .service(
                web::scope("/applications")
                    .service(web::resource("").route(web::get().to(job_application::list_applications)))
                    .service(
                        web::resource("/{application_id}/status")
                            .route(web::put().to(job_application::update_application_status)),
                    ),
            )
            .service(
                web::resource("/preferences")
                    .route(web::get().to(preferences::get_preferences))
                    .route(web::put().to(preferences::put_preferences)),
            ),
    );
}

// LOGIN
//  ├─ access_token (ACCESS_TOKEN_TTL)
//  └─ refresh_token (REFRESH_TOKEN_TTL)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ rotates the refresh token, returns a new pair
