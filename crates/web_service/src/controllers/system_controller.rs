use actix_web::{get, web, HttpResponse, Responder};

#[get("/")]
pub async fn health() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body("Server running")
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(health);
}
