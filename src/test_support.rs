//! Shared test helpers: loopback servers and synthetic images.

use std::io::Cursor;

use axum::Router;
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};

/// Serve `app` on an ephemeral loopback port; returns its base URL.
pub(crate) async fn spawn_upstream(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

/// Base URL of a port that was bound and released, so connections are refused.
pub(crate) async fn unreachable_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// Solid-color image encoded in `format`.
pub(crate) fn encode_test_image(
    width: u32,
    height: u32,
    color: [u8; 3],
    format: ImageOutputFormat,
) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(color));
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut cursor, format)
        .unwrap();
    cursor.into_inner()
}

/// Single-part `multipart/form-data` body: `(content_type, body)`.
pub(crate) fn multipart_body(field: &str, file_name: &str, mime: &str, bytes: &[u8]) -> (String, Vec<u8>) {
    let boundary = "agelens-test-boundary-7f3c";
    let mut body = Vec::with_capacity(bytes.len() + 256);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {mime}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}
