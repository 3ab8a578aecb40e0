use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;

use crate::auth::SessionService;
use crate::cookies::RefreshCookie;
use crate::middleware::{JwtMiddleware, RequestLogger};
use crate::routes::{get_current_user, health_check, login, logout, refresh, register};

pub fn run(
    listener: TcpListener,
    sessions: SessionService,
    cookie: RefreshCookie,
) -> Result<Server, std::io::Error> {
    let sessions = web::Data::new(sessions);
    let cookie = web::Data::new(cookie);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(RequestLogger)
            .app_data(sessions.clone())
            .app_data(cookie.clone())
            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/auth/register", web::post().to(register))
            .route("/auth/login", web::post().to(login))
            .route("/auth/refresh", web::post().to(refresh))
            // Protected routes (require a valid access token)
            .service(
                web::resource("/auth/logout")
                    .wrap(JwtMiddleware)
                    .route(web::post().to(logout)),
            )
            .service(
                web::resource("/auth/me")
                    .wrap(JwtMiddleware)
                    .route(web::get().to(get_current_user)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
