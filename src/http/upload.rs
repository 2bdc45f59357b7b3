//! Uploaded files and multipart/form-data decoding

use super::body::BodyStream;
use super::headers::{header_param, media_type, unquote};
use super::items::Items;
use super::{Error, Headers, Result, CRLF};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// A file submitted through a multipart form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    field: String,
    filename: String,
    content_type: Option<String>,
    data: Bytes,
}

impl UploadedFile {
    pub fn new(
        field: impl Into<String>,
        filename: impl Into<String>,
        content_type: Option<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        UploadedFile {
            field: field.into(),
            filename: filename.into(),
            content_type,
            data: data.into(),
        }
    }

    /// Form field the file was submitted under
    pub fn field(&self) -> &str {
        &self.field
    }

    /// File name as claimed by the client; never trust it as a path
    pub fn client_filename(&self) -> &str {
        &self.filename
    }

    /// Content type as claimed by the client
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    /// Fresh stream over the file contents
    pub fn stream(&self) -> BodyStream {
        BodyStream::from_bytes(self.data.clone())
    }

    /// Write the contents to `path`, replacing any existing file
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, &self.data)?;
        Ok(())
    }
}

/// Fields and files decoded from a multipart body
#[derive(Debug, Default)]
pub struct Multipart {
    pub fields: Items,
    /// Files by their literal field name, brackets included
    pub files: BTreeMap<String, UploadedFile>,
}

/// The boundary of a `multipart/form-data` content type, if any
pub fn form_data_boundary(content_type: &str) -> Option<&str> {
    if !media_type(content_type).eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }
    header_param(content_type, "boundary").filter(|b| !b.is_empty())
}

/// Decode a `multipart/form-data` body
///
/// Parts with a `filename` become files; all other parts become form fields
/// (bracketed names nest like urlencoded keys). Files are not nested: they
/// are keyed by the field name exactly as sent, so `docs[]` stays `docs[]`,
/// and a later file under the same name replaces an earlier one. A file
/// part submitted with an empty filename, which browsers send for an
/// untouched file input, is skipped.
pub fn parse_multipart(body: &Bytes, boundary: &str) -> Result<Multipart> {
    let delimiter = format!("--{}", boundary);
    let mut multipart = Multipart::default();

    let start = find(body, delimiter.as_bytes(), 0)
        .ok_or_else(|| Error::Multipart("Opening boundary not found".to_string()))?;
    let mut pos = start + delimiter.len();

    loop {
        if body[pos..].starts_with(b"--") {
            return Ok(multipart);
        }
        if !body[pos..].starts_with(CRLF.as_bytes()) {
            return Err(Error::Multipart("Expected CRLF after boundary".to_string()));
        }
        pos += 2;

        let head_end = find(body, b"\r\n\r\n", pos)
            .ok_or_else(|| Error::Multipart("Unterminated part headers".to_string()))?;
        let part_headers = parse_part_headers(&body[pos..head_end])?;
        let data_start = head_end + 4;

        let next_delimiter = format!("{}--{}", CRLF, boundary);
        let data_end = find(body, next_delimiter.as_bytes(), data_start)
            .ok_or_else(|| Error::Multipart("Closing boundary not found".to_string()))?;
        let data = body.slice(data_start..data_end);
        pos = data_end + next_delimiter.len();

        add_part(&mut multipart, &part_headers, data)?;
    }
}

fn add_part(multipart: &mut Multipart, headers: &Headers, data: Bytes) -> Result<()> {
    let disposition = headers
        .get("Content-Disposition")
        .ok_or_else(|| Error::Multipart("Part without Content-Disposition".to_string()))?;
    let name = header_param(disposition, "name")
        .ok_or_else(|| Error::Multipart("Part without a name".to_string()))?;

    match header_param(disposition, "filename") {
        Some("") => {}
        Some(filename) => {
            let content_type = headers.get("Content-Type").map(str::to_string);
            let file = UploadedFile::new(name, filename, content_type, data);
            multipart.files.insert(name.to_string(), file);
        }
        None => {
            let value = String::from_utf8_lossy(&data).into_owned();
            multipart.fields.insert(name, value);
        }
    }
    Ok(())
}

fn parse_part_headers(block: &[u8]) -> Result<Headers> {
    let text = String::from_utf8_lossy(block);
    let mut headers = Headers::new();
    for line in text.split(CRLF).filter(|l| !l.is_empty()) {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::Multipart(format!("No colon in part header: {}", line)))?;
        headers.insert(name.trim(), unquote_spaces(value));
    }
    Ok(headers)
}

fn unquote_spaces(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.starts_with('"') {
        unquote(trimmed).to_string()
    } else {
        trimmed.to_string()
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}
