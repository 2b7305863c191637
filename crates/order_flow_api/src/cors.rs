use actix_cors::Cors;
use actix_web::http::header;

pub fn build_cors() -> Cors {
	Cors::default()
		.allow_any_origin()
		.allowed_methods(vec!["GET", "POST"])
		.allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT])
		.max_age(3600)
}
