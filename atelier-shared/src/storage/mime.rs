/// Content type detection from magic bytes
///
/// The client-supplied `Content-Type` and file name are never trusted: the
/// type is decided from the leading bytes of the upload, and the stored file
/// extension is derived from that decision.
///
/// Office formats need a second look because the container is shared:
/// legacy `.doc`/`.xls` are both OLE2 compound files, `.docx`/`.xlsx` are both
/// ZIP archives. The stream or entry names inside tell them apart.

use serde::Serialize;

/// A content type the application knows how to store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DetectedType {
    Pdf,
    Jpeg,
    Png,
    Webp,
    /// Word 97-2003
    Doc,
    /// Word 2007+
    Docx,
    /// Excel 97-2003
    Xls,
    /// Excel 2007+
    Xlsx,
}

impl DetectedType {
    pub fn mime_type(&self) -> &'static str {
        match self {
            DetectedType::Pdf => "application/pdf",
            DetectedType::Jpeg => "image/jpeg",
            DetectedType::Png => "image/png",
            DetectedType::Webp => "image/webp",
            DetectedType::Doc => "application/msword",
            DetectedType::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            DetectedType::Xls => "application/vnd.ms-excel",
            DetectedType::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }

    /// File extension used for stored names
    pub fn extension(&self) -> &'static str {
        match self {
            DetectedType::Pdf => "pdf",
            DetectedType::Jpeg => "jpg",
            DetectedType::Png => "png",
            DetectedType::Webp => "webp",
            DetectedType::Doc => "doc",
            DetectedType::Docx => "docx",
            DetectedType::Xls => "xls",
            DetectedType::Xlsx => "xlsx",
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, DetectedType::Jpeg | DetectedType::Png | DetectedType::Webp)
    }
}

const PDF_MAGIC: &[u8] = b"%PDF-";
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const OLE2_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// How far into an OLE2 file to look for stream names
const OLE2_SCAN_LIMIT: usize = 512 * 1024;

/// Detects the content type of an upload
///
/// Returns `None` for anything outside the known set, including empty input.
///
/// # Example
///
/// ```
/// use atelier_shared::storage::mime::{sniff, DetectedType};
///
/// assert_eq!(sniff(b"%PDF-1.7\n..."), Some(DetectedType::Pdf));
/// assert_eq!(sniff(b"<html>"), None);
/// ```
pub fn sniff(bytes: &[u8]) -> Option<DetectedType> {
    if bytes.starts_with(PDF_MAGIC) {
        return Some(DetectedType::Pdf);
    }
    if bytes.starts_with(JPEG_MAGIC) {
        return Some(DetectedType::Jpeg);
    }
    if bytes.starts_with(PNG_MAGIC) {
        return Some(DetectedType::Png);
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some(DetectedType::Webp);
    }
    if bytes.starts_with(OLE2_MAGIC) {
        return sniff_ole2(bytes);
    }
    if bytes.starts_with(ZIP_MAGIC) {
        return sniff_ooxml(bytes);
    }

    None
}

/// Distinguishes Word from Excel inside an OLE2 compound file
///
/// Directory entries store stream names as UTF-16LE.
fn sniff_ole2(bytes: &[u8]) -> Option<DetectedType> {
    let window = &bytes[..bytes.len().min(OLE2_SCAN_LIMIT)];

    if contains(window, &utf16le("WordDocument")) {
        Some(DetectedType::Doc)
    } else if contains(window, &utf16le("Workbook")) || contains(window, &utf16le("Book")) {
        Some(DetectedType::Xls)
    } else {
        None
    }
}

/// Distinguishes Word from Excel inside an OOXML archive
///
/// Local file headers carry entry names in clear, so a byte search for the
/// part prefixes is enough.
fn sniff_ooxml(bytes: &[u8]) -> Option<DetectedType> {
    if contains(bytes, b"word/") {
        Some(DetectedType::Docx)
    } else if contains(bytes, b"xl/") {
        Some(DetectedType::Xlsx)
    } else {
        None
    }
}

fn utf16le(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect()
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty()
        && haystack.len() >= needle.len()
        && haystack.windows(needle.len()).any(|window| window == needle)
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Minimal byte sequences that pass the sniffer

    pub fn pdf() -> Vec<u8> {
        b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n%%EOF\n".to_vec()
    }

    pub fn jpeg() -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        bytes.extend_from_slice(b"JFIF\0");
        bytes.extend_from_slice(&[0u8; 16]);
        bytes
    }

    pub fn png() -> Vec<u8> {
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(&[0, 0, 0, 13]);
        bytes.extend_from_slice(b"IHDR");
        bytes.extend_from_slice(&[0u8; 13]);
        bytes
    }

    pub fn webp() -> Vec<u8> {
        let mut bytes = b"RIFF".to_vec();
        bytes.extend_from_slice(&[0x1A, 0, 0, 0]);
        bytes.extend_from_slice(b"WEBPVP8 ");
        bytes.extend_from_slice(&[0u8; 8]);
        bytes
    }

    fn ole2_with(stream: &str) -> Vec<u8> {
        let mut bytes = vec![0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
        bytes.extend_from_slice(&[0u8; 504]);
        bytes.extend(super::utf16le("Root Entry"));
        bytes.extend_from_slice(&[0u8; 44]);
        bytes.extend(super::utf16le(stream));
        bytes.extend_from_slice(&[0u8; 32]);
        bytes
    }

    pub fn doc() -> Vec<u8> {
        ole2_with("WordDocument")
    }

    pub fn xls() -> Vec<u8> {
        ole2_with("Workbook")
    }

    fn zip_with(entry: &str) -> Vec<u8> {
        let mut bytes = b"PK\x03\x04".to_vec();
        bytes.extend_from_slice(&[0x14, 0, 0, 0, 0x08, 0]);
        bytes.extend_from_slice(&[0u8; 16]);
        bytes.extend_from_slice(&(entry.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&[0, 0]);
        bytes.extend_from_slice(entry.as_bytes());
        bytes.extend_from_slice(&[0u8; 8]);
        bytes
    }

    pub fn docx() -> Vec<u8> {
        zip_with("word/document.xml")
    }

    pub fn xlsx() -> Vec<u8> {
        zip_with("xl/workbook.xml")
    }
}
