use porter::http::request::{Headers, Method, Request, RequestBuilder};

#[test]
fn test_request_header_retrieval() {
    let mut headers = Headers::new();
    headers.append("Host", "example.com");
    headers.append("Accept", "*/*");
    let req = Request {
        method: Method::GET,
        path: "/".to_string(),
        version: "HTTP/1.1".to_string(),
        headers,
    };

    assert_eq!(req.header("Host"), Some("example.com"));
    assert_eq!(req.header("accept"), Some("*/*"));
    assert_eq!(req.header("Missing"), None);
}

#[test]
fn test_headers_keep_duplicates_in_order() {
    let mut headers = Headers::new();
    headers.append("Cookie", "a=1");
    headers.append("Host", "x");
    headers.append("cookie", "b=2");

    assert_eq!(headers.len(), 3);
    assert_eq!(headers.get("Cookie"), Some("a=1"));
    assert_eq!(headers.get_all("COOKIE").collect::<Vec<_>>(), vec!["a=1", "b=2"]);
    assert_eq!(
        headers.iter().map(|(k, _)| k).collect::<Vec<_>>(),
        vec!["Cookie", "Host", "cookie"]
    );
}

#[test]
fn test_headers_empty() {
    let headers = Headers::new();

    assert!(headers.is_empty());
    assert!(!headers.contains("Host"));
}

#[test]
fn test_request_builder() {
    let req = RequestBuilder::new()
        .method(Method::HEAD)
        .path("/docs/")
        .header("Host", "localhost")
        .build()
        .unwrap();

    assert_eq!(req.method, Method::HEAD);
    assert_eq!(req.path, "/docs/");
    assert_eq!(req.version, "HTTP/1.1");
    assert_eq!(req.header("Host"), Some("localhost"));
    assert!(!req.wants_body());
}

#[test]
fn test_request_builder_requires_method_and_path() {
    assert_eq!(RequestBuilder::new().path("/").build().unwrap_err(), "method missing");
    assert_eq!(
        RequestBuilder::new().method(Method::GET).build().unwrap_err(),
        "path missing"
    );
}

#[test]
fn test_request_builder_counts_headers() {
    let builder = RequestBuilder::new().header("A", "1").header("A", "2");

    assert_eq!(builder.header_count(), 2);
}

#[test]
fn test_get_wants_body() {
    let req = RequestBuilder::new().method(Method::GET).path("/").build().unwrap();

    assert!(req.wants_body());
}

#[test]
fn test_method_from_str_roundtrip() {
    for method in [
        Method::GET,
        Method::HEAD,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
        Method::PATCH,
        Method::CONNECT,
        Method::TRACE,
    ] {
        assert_eq!(Method::from_str(method.as_str()), Some(method));
        assert_eq!(method.to_string(), method.as_str());
    }
    assert_eq!(Method::from_str("BREW"), None);
}

#[test]
fn test_header_values_outlive_the_lookup_name() {
    let mut headers = Headers::new();
    headers.append("Host", "example.com");
    headers.append("Cookie", "a=1");

    let (host, cookies) = {
        let host_name = String::from("host");
        let cookie_name = String::from("cookie");
        let host = headers.get(&host_name);
        let cookies: Vec<&str> = headers.get_all(&cookie_name).collect();
        (host, cookies)
    };

    assert_eq!(host, Some("example.com"));
    assert_eq!(cookies, vec!["a=1"]);
}
