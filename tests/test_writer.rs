mod utils;

use std::io;

use bytes::Bytes;
use porter::http::parser::split_header_line;
use porter::http::response::{Body, Response, ResponseBuilder, StatusCode};
use porter::http::writer::{ResponseWriter, SERVER_NAME};
use utils::{header_value, split_response};

const DATE: &str = "Sun, 06 Nov 1994 08:49:37 GMT";

#[test]
fn test_writes_status_line_framing_headers_and_body() {
    let response = ResponseBuilder::new(StatusCode::Ok)
        .header("Content-Type", "text/plain")
        .header("Content-Length", "11")
        .body(Body::stream(
            vec![Ok(Bytes::from_static(b"hello ")), Ok(Bytes::from_static(b"world"))].into_iter(),
        ))
        .build();
    let mut out = Vec::new();

    let written = ResponseWriter::with_date(response, DATE).write_to(&mut out).unwrap();

    assert_eq!(written, 11);
    let expected = format!(
        "HTTP/1.1 200 OK\r\nDate: {DATE}\r\nServer: {SERVER_NAME}\r\nConnection: close\r\nContent-Type: text/plain\r\nContent-Length: 11\r\n\r\nhello world"
    );
    assert_eq!(String::from_utf8(out).unwrap(), expected);
}

#[test]
fn test_header_block_round_trips_through_header_parsing() {
    let response = ResponseBuilder::new(StatusCode::Ok)
        .header("Content-Type", "text/html")
        .header("X-Dup", "one")
        .header("X-Dup", "two: with colon")
        .build();
    let mut out = Vec::new();

    ResponseWriter::with_date(response, DATE).write_to(&mut out).unwrap();

    let (_, lines, _) = split_response(&out);
    let parsed: Vec<(&str, &str)> = lines
        .iter()
        .map(|line| split_header_line(line).unwrap())
        .collect();
    assert_eq!(
        parsed,
        vec![
            ("Date", DATE),
            ("Server", SERVER_NAME),
            ("Connection", "close"),
            ("Content-Type", "text/html"),
            ("X-Dup", "one"),
            ("X-Dup", "two: with colon"),
        ]
    );
}

#[test]
fn test_send_error_has_no_body() {
    let mut out = Vec::new();

    ResponseWriter::send_error(&mut out, StatusCode::RequestHeaderFieldsTooLarge).unwrap();

    let (status, headers, body) = split_response(&out);
    assert_eq!(status, "HTTP/1.1 431 Request Header Fields Too Large");
    assert_eq!(header_value(&headers, "Server"), Some(SERVER_NAME));
    assert_eq!(header_value(&headers, "Content-Length"), Some("0"));
    assert!(header_value(&headers, "Date").unwrap().ends_with("GMT"));
    assert!(body.is_empty());
}

#[test]
fn test_failing_chunk_aborts_after_head() {
    let response = ResponseBuilder::new(StatusCode::Ok)
        .body(Body::stream(
            vec![
                Ok(Bytes::from_static(b"partial")),
                Err(io::Error::other("disk gone")),
            ]
            .into_iter(),
        ))
        .build();
    let mut out = Vec::new();

    let err = ResponseWriter::with_date(response, DATE).write_to(&mut out).unwrap_err();

    assert_eq!(err.to_string(), "disk gone");
    assert!(String::from_utf8(out).unwrap().ends_with("\r\n\r\npartial"));
}

#[test]
fn test_send_reports_body_length() {
    let mut out = Vec::new();
    let response = ResponseBuilder::new(StatusCode::Ok)
        .body(Body::from(Bytes::from_static(b"12345")))
        .build();

    assert_eq!(ResponseWriter::send(&mut out, response).unwrap(), 5);
    assert_eq!(ResponseWriter::send(&mut Vec::new(), Response::not_found()).unwrap(), 0);
}
