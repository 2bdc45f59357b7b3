//! Integration tests for the request view
//!
//! These tests build requests the way a front controller would and answer
//! them through the public response API.

use http_facade::http::{
    HttpRequest, HttpResponse, Item, Method, ProxyConfig, RequestView, ResponseBuilder, Status,
};
use std::io::Read;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

const UPLOAD: &str = concat!(
    "--b0undary\r\n",
    "Content-Disposition: form-data; name=\"title\"\r\n\r\n",
    "Quarterly numbers\r\n",
    "--b0undary\r\n",
    "Content-Disposition: form-data; name=\"sheet\"; filename=\"q3.csv\"\r\n",
    "Content-Type: text/csv\r\n\r\n",
    "region,total\r\nnorth,12\r\n",
    "--b0undary\r\n",
    "Content-Disposition: form-data; name=\"notes\"; filename=\"\"\r\n",
    "Content-Type: application/octet-stream\r\n\r\n",
    "\r\n",
    "--b0undary--\r\n",
);

fn upload_request() -> HttpRequest {
    HttpRequest::builder()
        .method(Method::Post)
        .uri("/sheets?folder[name]=finance&folder[year]=2024&tags[]=q3&tags[]=draft")
        .header("Content-Type", "multipart/form-data; boundary=b0undary")
        .header("Accept", "application/json")
        .body(UPLOAD)
        .try_build()
        .unwrap()
}

#[test]
fn test_upload_is_saved_to_disk() {
    let request = upload_request();
    assert!(request.is_upload());
    assert!(request.has_file(&["sheet"]));
    assert!(!request.has_file(&["notes"]));
    assert_eq!(request.item("title").and_then(Item::as_str), Some("Quarterly numbers"));

    let sheet = request.file("sheet").unwrap();
    assert_eq!(sheet.client_filename(), "q3.csv");
    assert_eq!(sheet.content_type(), Some("text/csv"));

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("saved.csv");
    sheet.save_to(&target).unwrap();
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "region,total\r\nnorth,12");
}

#[test]
fn test_nested_query_items() {
    let request = upload_request();

    let folder = request.query_item("folder").and_then(Item::as_map).unwrap();
    assert_eq!(folder.get("name").and_then(Item::as_str), Some("finance"));
    assert_eq!(folder.get("year").and_then(Item::as_str), Some("2024"));

    let tags: Vec<_> = request
        .query_item("tags")
        .and_then(Item::as_list)
        .unwrap()
        .iter()
        .filter_map(Item::as_str)
        .collect();
    assert_eq!(tags, vec!["q3", "draft"]);
}

#[test]
fn test_uploaded_file_echoed_as_download() {
    let request = Arc::new(upload_request());
    let sheet = request.file("sheet").unwrap();

    let response = HttpResponse::new(Status::OK)
        .follows(&request)
        .force_download_of(sheet.stream(), sheet.client_filename(), None);

    // the client only accepts JSON
    assert!(!response.is_valid());

    let body = response.send_with(|snapshot| {
        assert_eq!(
            snapshot.headers.get("Content-Disposition"),
            Some("attachment; filename=\"q3.csv\"")
        );
        let mut body = Vec::new();
        snapshot.body.unwrap().read_to_end(&mut body).unwrap();
        body
    });
    assert_eq!(body, sheet.bytes().as_ref());
}

#[test]
fn test_proxied_client_address() {
    let balancer = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));
    let request = HttpRequest::builder()
        .peer_addr(balancer)
        .header("X-Forwarded-For", "203.0.113.9, 10.0.0.2")
        .build();

    assert_eq!(request.client_ip(), balancer);
    assert_eq!(request.real_client_ip(), "203.0.113.9".parse::<IpAddr>().unwrap());
    assert!(request.is_proxy_request());

    let untrusting = HttpRequest::builder()
        .peer_addr(balancer)
        .header("X-Forwarded-For", "203.0.113.9")
        .proxy_config(ProxyConfig::disabled())
        .build();
    assert_eq!(untrusting.real_client_ip(), balancer);
    assert!(!untrusting.is_proxy_request());
}

#[test]
fn test_json_endpoint_flow() {
    let request = Arc::new(
        HttpRequest::builder()
            .method(Method::Put)
            .uri("/settings")
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, */*;q=0.1")
            .header("X-Requested-With", "XMLHttpRequest")
            .body("{\"theme\":\"dark\"}")
            .build(),
    );

    assert!(request.uses_method(&["put", "PATCH"]));
    assert!(request.is_requested_with("XMLHttpRequest"));
    assert_eq!(request.content_mime_type().as_deref(), Some("application/json"));
    assert_eq!(request.contents().as_deref(), Some("{\"theme\":\"dark\"}"));
    assert!(!request.has_request_item(&["theme"]));

    let response = HttpResponse::new(Status::OK)
        .follows(&request)
        .with_content_mime_type_if("application/json")
        .with_content(request.contents().unwrap_or_default());
    assert!(response.is_valid());

    let snapshot = response.send_with(|snapshot| snapshot);
    assert_eq!(snapshot.headers.get("Content-Type"), Some("application/json"));
    assert_eq!(snapshot.headers.get("Content-Length"), Some("16"));
}
