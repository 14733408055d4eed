//! Shared wiremock fixtures for dufs listing tests.

#![allow(dead_code)]

use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A listing entry: `(name, is_directory)`.
pub type Entry<'a> = (&'a str, bool);

/// Builds a dufs listing document.
pub fn listing_body(href: &str, entries: &[Entry<'_>]) -> Value {
    let paths: Vec<Value> = entries
        .iter()
        .map(|(name, is_dir)| {
            json!({
                "name": name,
                "path_type": if *is_dir { "Dir" } else { "File" },
                "mtime": 1_700_000_000_000_u64,
                "size": if *is_dir { Value::Null } else { json!(4) },
            })
        })
        .collect();
    json!({ "href": href, "uri_prefix": "/", "allow_upload": false, "paths": paths })
}

/// A mock answering `GET <dir_path>?json` with a listing.
///
/// `dir_path` is the percent-encoded request path and must end with `/`.
pub fn listing_mock(dir_path: &str, href: &str, entries: &[Entry<'_>]) -> Mock {
    Mock::given(method("GET"))
        .and(path(dir_path))
        .and(query_param("json", ""))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_body(href, entries)))
}

/// Mounts a listing whose `href` equals its own path.
pub async fn mount_listing(server: &MockServer, dir_path: &str, entries: &[Entry<'_>]) {
    listing_mock(dir_path, dir_path, entries)
        .mount(server)
        .await;
}

/// Mounts a plain file body.
pub async fn mount_file(server: &MockServer, file_path: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(file_path))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}
