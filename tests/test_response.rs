use hearth::http::response::{Response, ResponseBuilder, StatusCode};

#[test]
fn test_status_code_as_u16() {
    assert_eq!(StatusCode::OK.as_u16(), 200);
    assert_eq!(StatusCode::CREATED.as_u16(), 201);
    assert_eq!(StatusCode::NO_CONTENT.as_u16(), 204);
    assert_eq!(StatusCode::BAD_REQUEST.as_u16(), 400);
    assert_eq!(StatusCode::NOT_FOUND.as_u16(), 404);
    assert_eq!(StatusCode::METHOD_NOT_ALLOWED.as_u16(), 405);
    assert_eq!(StatusCode::INTERNAL_SERVER_ERROR.as_u16(), 500);
}

#[test]
fn test_status_code_reason_phrase() {
    assert_eq!(StatusCode::OK.reason_phrase(), "OK");
    assert_eq!(StatusCode::NO_CONTENT.reason_phrase(), "No Content");
    assert_eq!(StatusCode::BAD_REQUEST.reason_phrase(), "Bad Request");
    assert_eq!(
        StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE.reason_phrase(),
        "Request Header Fields Too Large"
    );
    assert_eq!(
        StatusCode::HTTP_VERSION_NOT_SUPPORTED.reason_phrase(),
        "HTTP Version Not Supported"
    );
    assert_eq!(StatusCode::from_u16(599).unwrap().reason_phrase(), "");
}

#[test]
fn test_status_code_range() {
    assert_eq!(StatusCode::from_u16(99), None);
    assert_eq!(StatusCode::from_u16(1000), None);
    assert_eq!(StatusCode::from_u16(418).map(|s| s.as_u16()), Some(418));
}

#[test]
fn test_status_code_allows_body() {
    assert!(StatusCode::OK.allows_body());
    assert!(StatusCode::NOT_FOUND.allows_body());
    assert!(!StatusCode::NO_CONTENT.allows_body());
    assert!(!StatusCode::NOT_MODIFIED.allows_body());
    assert!(!StatusCode::CONTINUE.allows_body());
}

#[test]
fn test_status_code_display() {
    assert_eq!(StatusCode::NOT_FOUND.to_string(), "404 Not Found");
}

#[test]
fn test_response_builder_basic() {
    let response = ResponseBuilder::new(StatusCode::OK)
        .body("Hello, World!")
        .build();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(&response.body[..], b"Hello, World!");
    assert!(response.headers.is_empty());
}

#[test]
fn test_response_builder_keeps_header_order() {
    let response = ResponseBuilder::new(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("Cache-Control", "no-cache")
        .header("Set-Cookie", "a=1")
        .header("Set-Cookie", "b=2")
        .build();

    assert_eq!(
        response.headers,
        vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Cache-Control".to_string(), "no-cache".to_string()),
            ("Set-Cookie".to_string(), "a=1".to_string()),
            ("Set-Cookie".to_string(), "b=2".to_string()),
        ]
    );
    assert_eq!(response.header("set-cookie"), Some("a=1"));
}

#[test]
fn test_response_ok_helper() {
    let response = Response::ok("test content");

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("Content-Type"), Some("text/plain"));
    assert_eq!(&response.body[..], b"test content");
}

#[test]
fn test_response_not_found_helper() {
    let response = Response::not_found();

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(&response.body[..], b"404 Not Found");
}

#[test]
fn test_response_internal_error_helper() {
    let response = Response::internal_error();

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(&response.body[..], b"500 Internal Server Error");
}
