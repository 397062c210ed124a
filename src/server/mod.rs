pub mod http;
pub mod protocol;
pub mod ws_session;

use actix_web::dev::Service;
use actix_web::{web, App, HttpServer};
use std::sync::Arc;

use crate::tracker::Tracker;
use self::http::AppState;

/// Serves the REST routes and the realtime socket until the server is
/// stopped. Must be called from within an actix system.
pub async fn run(host: &str, port: u16, tracker: Arc<Tracker>) -> std::io::Result<()> {
    let app_state = web::Data::new(AppState {
        tracker: tracker.clone(),
    });
    let server = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap_fn(|req, srv| {
                debug!("incoming request: {} {}", req.method(), req.uri());
                srv.call(req)
            })
            .configure(self::http::configure)
    })
    .bind((host, port))?;

    for addr in server.addrs() {
        info!("tracking server listening on {}", addr);
    }
    let result = server.run().await;

    if let Err(e) = tracker.flush() {
        error!("failed to flush location log on shutdown: {}", e);
    }
    result
}
