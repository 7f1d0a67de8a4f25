/// Multipart form collection and file download responses
///
/// Browsers post repeated fields as `images[]`; the suffix is dropped so
/// handlers look fields up by their bare name. File inputs left empty still
/// arrive as a part with no bytes and are skipped.

use crate::error::ApiError;
use atelier_shared::storage::sniff;
use axum::{
    body::Body,
    extract::Multipart,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use std::collections::HashMap;

/// Cache policy for documents served to their owner
pub const NO_STORE: &str = "no-store";

/// Cache policy for portfolio images on the public site
pub const PUBLIC_IMAGE_CACHE: &str = "public, max-age=86400";

/// Cache policy for images in the admin area
pub const PRIVATE_IMAGE_CACHE: &str = "private, max-age=3600";

/// An uploaded file part
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-side name, informational only
    pub file_name: String,
    pub bytes: Bytes,
}

/// A fully buffered multipart form
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, Vec<String>>,
    files: HashMap<String, Vec<UploadedFile>>,
}

impl MultipartForm {
    /// Reads every part of the body
    pub async fn collect(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = MultipartForm::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(field_key) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let bytes = field.bytes().await?;
                    if bytes.is_empty() {
                        continue;
                    }
                    form.files
                        .entry(name)
                        .or_default()
                        .push(UploadedFile { file_name, bytes });
                }
                None => {
                    let value = field.text().await?;
                    form.fields.entry(name).or_default().push(value);
                }
            }
        }

        Ok(form)
    }

    /// First value of a text field, untrimmed
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// First value of a text field, trimmed; blank counts as absent
    pub fn optional_text(&self, name: &str) -> Option<String> {
        self.text(name)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }

    /// Every value of a repeated text field
    pub fn texts(&self, name: &str) -> &[String] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.get(name).and_then(|files| files.first())
    }

    pub fn files(&self, name: &str) -> &[UploadedFile] {
        self.files.get(name).map(Vec::as_slice).unwrap_or_default()
    }
}

fn field_key(name: &str) -> String {
    name.strip_suffix("[]").unwrap_or(name).to_string()
}

/// Serves stored bytes inline under a readable file name
///
/// `display_name` is the name the user gave the document; the extension comes
/// from the stored file, never from user input.
pub fn file_response(
    bytes: Vec<u8>,
    content_type: &str,
    display_name: &str,
    extension: &str,
    cache_control: &'static str,
) -> Response {
    let filename = format!("{}.{}", display_name.trim(), extension);
    let disposition = content_disposition(&filename);

    let mut response = (StatusCode::OK, Body::from(bytes)).into_response();
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(cache_control));

    response
}

/// Serves an image with its type detected from the bytes themselves
pub fn image_response(bytes: Vec<u8>, cache_control: &'static str) -> Response {
    let content_type = sniff(&bytes)
        .map(|detected| detected.mime_type())
        .unwrap_or("application/octet-stream");

    let mut response = (StatusCode::OK, Body::from(bytes)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(cache_control));

    response
}

/// Extension of a stored name (`"ab12….pdf"` gives `"pdf"`)
pub fn stored_extension(stored_name: &str) -> &str {
    stored_name
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .unwrap_or("bin")
}

/// `inline` disposition with an ASCII fallback and an RFC 5987 UTF-8 name
pub fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, ' ' | '.' | '-' | '_' | '(' | ')') {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "inline; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        percent_encode(filename)
    )
}

fn percent_encode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'-' | b'_' | b'~') {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{FromRequest, Request};

    const BOUNDARY: &str = "XBOUNDARYX";

    fn multipart_request(parts: &[(&str, Option<&str>, &[u8])]) -> Request {
        let mut body = Vec::new();
        for (name, file_name, content) in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match file_name {
                Some(file_name) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        name, file_name
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                ),
            }
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn collect(parts: &[(&str, Option<&str>, &[u8])]) -> MultipartForm {
        let multipart = Multipart::from_request(multipart_request(parts), &())
            .await
            .unwrap();
        MultipartForm::collect(multipart).await.unwrap()
    }

    #[tokio::test]
    async fn test_collect_fields_and_files() {
        let form = collect(&[
            ("title", None, b"  Groupe scolaire  "),
            ("delete_images[]", None, b"a"),
            ("delete_images[]", None, b"b"),
            ("images[]", Some("one.png"), b"\x89PNG"),
            ("images[]", Some("two.png"), b"\x89PNG"),
        ])
        .await;

        assert_eq!(form.text("title"), Some("  Groupe scolaire  "));
        assert_eq!(form.optional_text("title").as_deref(), Some("Groupe scolaire"));
        assert_eq!(form.texts("delete_images"), ["a", "b"]);
        assert_eq!(form.files("images").len(), 2);
        assert_eq!(form.files("images")[1].file_name, "two.png");
    }

    #[tokio::test]
    async fn test_empty_file_inputs_are_skipped() {
        let form = collect(&[("name", None, b"Report"), ("file", Some(""), b"")]).await;

        assert!(form.file("file").is_none());
        assert!(form.files("images").is_empty());
        assert_eq!(form.optional_text("description"), None);
    }

    #[tokio::test]
    async fn test_blank_text_is_absent() {
        let form = collect(&[("cover_image_id", None, b"   ")]).await;
        assert_eq!(form.text("cover_image_id"), Some("   "));
        assert_eq!(form.optional_text("cover_image_id"), None);
    }

    #[test]
    fn test_content_disposition_fallback_and_utf8_name() {
        let value = content_disposition("Devis été \"final\".pdf");
        assert!(value.starts_with("inline; filename=\"Devis _t_ _final_.pdf\""));
        assert!(value.ends_with("filename*=UTF-8''Devis%20%C3%A9t%C3%A9%20%22final%22.pdf"));
    }

    #[test]
    fn test_stored_extension() {
        assert_eq!(stored_extension("0123456789abcdef0123456789abcdef.docx"), "docx");
        assert_eq!(stored_extension("noextension"), "bin");
    }

    #[test]
    fn test_file_response_headers() {
        let response = file_response(b"%PDF-1.4".to_vec(), "application/pdf", " Contrat ", "pdf", NO_STORE);

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "inline; filename=\"Contrat.pdf\"; filename*=UTF-8''Contrat.pdf"
        );
    }

    #[test]
    fn test_image_response_sniffs_content_type() {
        let png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
        let response = image_response(png, PUBLIC_IMAGE_CACHE);

        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "public, max-age=86400");

        let response = image_response(b"not an image".to_vec(), PRIVATE_IMAGE_CACHE);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/octet-stream");
    }
}
