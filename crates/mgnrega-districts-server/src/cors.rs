use axum::body::Body;
use axum::http::{HeaderValue, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

// Open-data service: every origin is allowed.
fn put_cors_headers(resp: &mut Response) {
    let headers = resp.headers_mut();
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static(
            "Origin, X-Requested-With, Content-Type, Accept, Authorization",
        ),
    );
}

pub(crate) async fn cors_middleware(req: Request<Body>, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        let mut resp = StatusCode::OK.into_response();
        put_cors_headers(&mut resp);
        return resp;
    }
    let mut resp = next.run(req).await;
    put_cors_headers(&mut resp);
    resp
}
