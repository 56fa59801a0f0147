//! HTTP route definitions
//!
//! Every path goes through one fallback handler: paths ending in an action
//! token are dispatched, other GETs fall back to static files.

use crate::{middleware, ApiError, AppState};
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    Router,
};
use bytes::Bytes;
use docgate_core::{render, CommandRequest, Params, Route};
use std::path::Path;
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};
use tracing::debug;

/// Extensions the static fallback serves
const STATIC_EXTENSIONS: &[&str] = &["html", "htm", "gif", "jpg", "png", "json", "css", "js", "ico"];

/// Create the main router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .fallback(handle_request)
        // Apply middleware
        .layer(axum_middleware::from_fn_with_state(
            Arc::clone(&state),
            middleware::response_headers_middleware,
        ))
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(DefaultBodyLimit::max(state.config.max_body_size))
        .with_state(state)
}

async fn handle_request(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    if method != Method::GET && method != Method::POST {
        return Err(ApiError::MethodNotAllowed(method.to_string()));
    }

    let Some(route) = Route::parse(uri.path()) else {
        if method == Method::GET {
            return serve_static(&state.config.docroot, uri.path()).await;
        }
        return Err(ApiError::NotFound(uri.path().to_string()));
    };

    let mut params = Params::new();
    if let Some(query) = uri.query() {
        parse_form(&mut params, query.as_bytes());
    }
    if method == Method::POST && !body.is_empty() {
        if !is_form_body(&headers) {
            return Err(ApiError::BadRequest(
                "POST bodies must be application/x-www-form-urlencoded".to_string(),
            ));
        }
        parse_form(&mut params, &body);
    }

    let callback = params.get("callback").map(str::to_string);
    let request = CommandRequest {
        action: route.action,
        database: Some(route.database),
        collection: route.collection,
        params,
    };

    let reply = state.gateway.dispatch(&request).await;
    let body = render(reply, callback.as_deref());

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response())
}

fn parse_form(params: &mut Params, input: &[u8]) {
    for (key, value) in url::form_urlencoded::parse(input) {
        params.insert(key.into_owned(), value.into_owned());
    }
}

/// A missing content type is read as a form body
fn is_form_body(headers: &HeaderMap) -> bool {
    match headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        None => true,
        Some(content_type) => content_type
            .split(';')
            .next()
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/x-www-form-urlencoded")),
    }
}

/// Serve a file directly under `docroot`; `/` maps to `index.html`
async fn serve_static(docroot: &Path, path: &str) -> Result<Response, ApiError> {
    let not_found = || ApiError::NotFound(path.to_string());

    let name = match path.trim_matches('/') {
        "" => "index.html",
        name => name,
    };
    if name.contains('/') || name.contains("..") {
        return Err(not_found());
    }

    let extension = name.rsplit_once('.').map(|(_, ext)| ext).ok_or_else(not_found)?;
    if !STATIC_EXTENSIONS.contains(&extension) {
        return Err(not_found());
    }

    let contents = tokio::fs::read(docroot.join(name)).await.map_err(|e| {
        debug!(file = name, error = %e, "Static file unavailable");
        not_found()
    })?;
    let content_type = mime_guess::from_ext(extension).first_or_octet_stream();

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type.essence_str().to_string())],
        contents,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GatewayConfig;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn router() -> Router {
        let state = AppState::new(GatewayConfig::default()).await.unwrap();
        create_router(Arc::new(state))
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_through_router() {
        let response = router()
            .await
            .oneshot(Request::get("/_hello").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert!(body_text(response).await.contains(r#""ok":1"#));
    }

    #[tokio::test]
    async fn test_unsupported_method_and_route() {
        let response = router()
            .await
            .oneshot(Request::delete("/t/c/_find").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let response = router()
            .await
            .oneshot(Request::post("/t/c/_drop").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_multipart_body_is_rejected() {
        let request = Request::post("/t/c/_insert")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=x")
            .body(Body::from("--x--"))
            .unwrap();
        let response = router().await.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_form_parsing_keeps_repeats() {
        let mut params = Params::new();
        parse_form(&mut params, b"criteria=%7B%22x%22%3A1%7D&safe=1&safe=0");
        assert_eq!(params.get("criteria"), Some(r#"{"x":1}"#));
        assert_eq!(params.get_all("safe").len(), 2);
    }

    #[test]
    fn test_form_content_type() {
        let mut headers = HeaderMap::new();
        assert!(is_form_body(&headers));

        headers.insert(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded; charset=UTF-8".parse().unwrap(),
        );
        assert!(is_form_body(&headers));

        headers.insert(header::CONTENT_TYPE, "multipart/form-data".parse().unwrap());
        assert!(!is_form_body(&headers));
    }

    #[tokio::test]
    async fn test_static_rejections() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        for path in ["/notes.txt", "/../secret.html", "/a/b.html", "/missing.html", "/noext"] {
            let err = serve_static(dir.path(), path).await.unwrap_err();
            assert!(matches!(err, ApiError::NotFound(_)), "{path}");
        }
    }

    #[tokio::test]
    async fn test_static_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>hi</h1>").unwrap();

        let response = serve_static(dir.path(), "/").await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "text/html");
    }
}
