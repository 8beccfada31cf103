//! A local distribution gateway.
//!
//! - paths containing `not-here` answer 404,
//! - paths ending in `versions` serve a fixed manifest, except below
//!   `prerelease` packages whose newest tag is a release candidate,
//! - paths ending in `.tar.gz` or `.zip` serve a fake release archive holding
//!   `<package>/<binary>` with the contents `FAKE DATA`,
//! - paths containing `slow` never answer in time,
//! - paths ending in `user-agent` echo the `User-Agent` header.
#![allow(dead_code)]

use std::{io::Write, time::Duration};

use axum::{
    Router,
    body::Body,
    http::{
        HeaderMap, Response, StatusCode, Uri,
        header::{CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT},
    },
    serve,
};
use flate2::{Compression, write::GzEncoder};
use tokio::net::TcpListener;

pub const VERSIONS: &str = "v1.0.0\nv1.1.0\nv1.1.2\nv2.0.0-rc1\n2.0.0\nv2.0.1\n";
pub const PRERELEASE_VERSIONS: &str = "v1.0.0\nv1.1.0-rc1\n";
pub const FAKE_DATA: &[u8] = b"FAKE DATA";

pub struct TestGateway {
    url: String,
}

impl TestGateway {
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let router = Router::new().fallback(handle);
        let server = serve(listener, router);
        tokio::spawn(async move {
            let _ = server.await;
        });

        Self {
            url: format!("http://{addr}"),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

async fn handle(uri: Uri, headers: HeaderMap) -> Response<Body> {
    let path = uri.path();
    if path.contains("not-here") {
        return respond(StatusCode::NOT_FOUND, b"404 page not found\n".to_vec());
    }
    if path.contains("slow") {
        tokio::time::sleep(Duration::from_secs(30)).await;
    }
    if path.ends_with("versions") {
        let manifest = if path.contains("prerelease") {
            PRERELEASE_VERSIONS
        } else {
            VERSIONS
        };
        return respond(StatusCode::OK, manifest.as_bytes().to_vec());
    }
    if path.ends_with("user-agent") {
        let agent = headers
            .get(USER_AGENT)
            .map(|value| value.as_bytes().to_vec())
            .unwrap_or_default();
        return respond(StatusCode::OK, agent);
    }
    if path.ends_with(".tar.gz") || path.ends_with(".zip") {
        return respond(StatusCode::OK, fake_archive(path));
    }
    respond(StatusCode::NOT_FOUND, b"404 page not found\n".to_vec())
}

fn respond(status: StatusCode, body: Vec<u8>) -> Response<Body> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/octet-stream")
        .header(CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap()
}

/// Builds the archive a release at `path` would contain:
/// `<dist>/<package>/<version>/<package>_<version>_<platform>.<ext>` holds
/// `<package>/<binary>`.
fn fake_archive(path: &str) -> Vec<u8> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let archive_name = segments[segments.len() - 1];
    let package = segments[segments.len() - 3];

    let mut binary = archive_name.split('_').next().unwrap().to_string();
    if binary == "go-ipfs" {
        binary = "ipfs".to_string();
    }

    if archive_name.ends_with(".zip") {
        zip_with_entry(&format!("{package}/{binary}.exe"), FAKE_DATA)
    } else {
        tar_gz_with_entry(&format!("{package}/{binary}"), FAKE_DATA)
    }
}

pub fn tar_gz_with_entry(name: &str, data: &[u8]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    builder.append_data(&mut header, name, data).unwrap();
    builder.into_inner().unwrap().finish().unwrap()
}

pub fn zip_with_entry(name: &str, data: &[u8]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    zip.start_file(name, options).unwrap();
    zip.write_all(data).unwrap();
    zip.finish().unwrap().into_inner()
}
