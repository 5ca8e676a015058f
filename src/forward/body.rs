//! Content-type dependent body re-encoding.
//!
//! The upstream expects plain form posts as `application/x-www-form-urlencoded`
//! even when the client sent `multipart/form-data`; multipart survives only
//! when it actually carries file parts. JSON and everything else pass through
//! as raw bytes. The multipart parser here is deliberately minimal: boundary
//! split, part headers, `name="..."` / `filename="..."` extraction.

use reqwest::multipart::{Form, Part};
use url::form_urlencoded;

/// One part of a multipart body. A part with a filename is a file upload;
/// anything else is a plain form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartPart {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl MultipartPart {
    pub fn is_file(&self) -> bool {
        self.filename.is_some()
    }
}

/// Extract the boundary parameter from a multipart content-type value.
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|param| {
        let param = param.trim();
        let value = param.strip_prefix("boundary=")?;
        Some(value.trim_matches('"').to_string())
    })
}

/// Parse a raw multipart body into its parts.
///
/// Parts without a `name` attribute are dropped, as are malformed segments;
/// a truncated body yields whatever parsed cleanly rather than an error.
pub fn parse_multipart(body: &[u8], boundary: &str) -> Vec<MultipartPart> {
    let delimiter = format!("--{}", boundary);
    let mut parts = Vec::new();

    for segment in split_on(body, delimiter.as_bytes()) {
        // The closing delimiter leaves a bare "--" segment; preamble and
        // epilogue segments carry no header block at all. Only the framing
        // CRLFs are trimmed; part data keeps its own bytes intact.
        let segment = trim_framing(segment);
        if segment.is_empty() || segment == b"--" {
            continue;
        }
        let Some(header_end) = find_subslice(segment, b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&segment[..header_end]);
        let data = segment[header_end + 4..].to_vec();

        let mut name = None;
        let mut filename = None;
        let mut content_type = None;
        for line in headers.lines() {
            let lower = line.to_ascii_lowercase();
            if lower.starts_with("content-disposition:") {
                name = attribute_value(line, "name");
                filename = attribute_value(line, "filename");
            } else if let Some(value) = lower
                .starts_with("content-type:")
                .then(|| line[13..].trim().to_string())
            {
                content_type = Some(value);
            }
        }

        if let Some(name) = name {
            parts.push(MultipartPart {
                name,
                filename,
                content_type,
                data,
            });
        }
    }

    parts
}

/// Re-encode a urlencoded body, dropping anything that is not a key=value pair.
pub fn reencode_urlencoded(body: &[u8]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in form_urlencoded::parse(body) {
        serializer.append_pair(&key, &value);
    }
    serializer.finish()
}

/// Flatten non-file multipart fields into a urlencoded body.
pub fn parts_to_urlencoded(parts: &[MultipartPart]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for part in parts {
        if !part.is_file() {
            serializer.append_pair(&part.name, &String::from_utf8_lossy(&part.data));
        }
    }
    serializer.finish()
}

/// Rebuild a true multipart form, preserving every field and file part.
/// Array-of-files field names (e.g. `files[]`) survive untouched since each
/// part keeps its original name.
pub fn rebuild_multipart(parts: Vec<MultipartPart>) -> Form {
    let mut form = Form::new();
    for part in parts {
        let mut piece = Part::bytes(part.data.clone());
        if let Some(filename) = &part.filename {
            piece = piece.file_name(filename.clone());
        }
        if let Some(content_type) = &part.content_type {
            piece = match piece.mime_str(content_type) {
                Ok(with_mime) => with_mime,
                // An unparseable part content-type falls back to octets.
                Err(_) => {
                    let mut fallback = Part::bytes(part.data);
                    if let Some(filename) = part.filename {
                        fallback = fallback.file_name(filename);
                    }
                    fallback
                }
            };
        }
        form = form.part(part.name, piece);
    }
    form
}

/// Pull a quoted attribute like `name="field"` out of a header line.
fn attribute_value(line: &str, attribute: &str) -> Option<String> {
    let needle = format!("{}=\"", attribute);
    let start = line.find(&needle)? + needle.len();
    let end = line[start..].find('"')? + start;
    Some(line[start..end].to_string())
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn split_on<'a>(data: &'a [u8], delimiter: &[u8]) -> Vec<&'a [u8]> {
    let mut segments = Vec::new();
    let mut rest = data;
    while let Some(pos) = find_subslice(rest, delimiter) {
        segments.push(&rest[..pos]);
        rest = &rest[pos + delimiter.len()..];
    }
    segments.push(rest);
    segments
}

/// Trim the CRLFs that belong to the multipart framing: any leading ones
/// (before the part headers) and exactly one trailing one (before the next
/// delimiter).
fn trim_framing(mut segment: &[u8]) -> &[u8] {
    while segment.starts_with(b"\r\n") {
        segment = &segment[2..];
    }
    if segment.ends_with(b"\r\n") {
        segment = &segment[..segment.len() - 2];
    }
    segment
}

#[cfg(test)]
mod tests {
    use super::*;

    fn multipart_body(boundary: &str, parts: &[(&str, Option<&str>, &str)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, filename, data) in parts {
            body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            match filename {
                Some(f) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                        name, f
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                ),
            }
            body.extend_from_slice(data.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
        body
    }

    #[test]
    fn extracts_boundary_with_and_without_quotes() {
        assert_eq!(
            boundary_from_content_type("multipart/form-data; boundary=xyz123"),
            Some("xyz123".to_string())
        );
        assert_eq!(
            boundary_from_content_type("multipart/form-data; boundary=\"xyz123\""),
            Some("xyz123".to_string())
        );
        assert_eq!(boundary_from_content_type("application/json"), None);
    }

    #[test]
    fn parses_plain_fields() {
        let body = multipart_body("bnd", &[("a", None, "1"), ("b", None, "two words")]);
        let parts = parse_multipart(&body, "bnd");
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name, "a");
        assert_eq!(parts[0].data, b"1");
        assert!(!parts[0].is_file());
        assert_eq!(parts[1].data, b"two words");
    }

    #[test]
    fn parses_file_parts_with_filename_and_mime() {
        let body = multipart_body("bnd", &[("doc", Some("a.txt"), "contents")]);
        let parts = parse_multipart(&body, "bnd");
        assert_eq!(parts.len(), 1);
        assert!(parts[0].is_file());
        assert_eq!(parts[0].filename.as_deref(), Some("a.txt"));
        assert_eq!(
            parts[0].content_type.as_deref(),
            Some("application/octet-stream")
        );
        assert_eq!(parts[0].data, b"contents");
    }

    #[test]
    fn mixed_fields_and_file_arrays() {
        let body = multipart_body(
            "bnd",
            &[
                ("title", None, "hello"),
                ("files[]", Some("a.txt"), "aaa"),
                ("files[]", Some("b.txt"), "bbb"),
            ],
        );
        let parts = parse_multipart(&body, "bnd");
        assert_eq!(parts.len(), 3);
        assert_eq!(parts.iter().filter(|p| p.is_file()).count(), 2);
        assert_eq!(parts[1].name, "files[]");
        assert_eq!(parts[2].name, "files[]");
    }

    #[test]
    fn file_content_keeps_its_own_trailing_newline() {
        let body = multipart_body("bnd", &[("f", Some("a.txt"), "line one\r\n")]);
        let parts = parse_multipart(&body, "bnd");
        assert_eq!(parts[0].data, b"line one\r\n");
    }

    #[test]
    fn fields_flatten_to_urlencoded() {
        let body = multipart_body("bnd", &[("a", None, "1"), ("b", None, "x&y=z")]);
        let parts = parse_multipart(&body, "bnd");
        assert_eq!(parts_to_urlencoded(&parts), "a=1&b=x%26y%3Dz");
    }

    #[test]
    fn file_parts_are_excluded_from_urlencoded_form() {
        let body = multipart_body("bnd", &[("a", None, "1"), ("f", Some("x.bin"), "data")]);
        let parts = parse_multipart(&body, "bnd");
        assert_eq!(parts_to_urlencoded(&parts), "a=1");
    }

    #[test]
    fn reencodes_urlencoded_bodies() {
        assert_eq!(
            reencode_urlencoded(b"a=1&b=hello+world&c=%26"),
            "a=1&b=hello+world&c=%26"
        );
        assert_eq!(reencode_urlencoded(b""), "");
    }

    #[test]
    fn truncated_body_parses_what_it_can() {
        let mut body = multipart_body("bnd", &[("a", None, "1")]);
        body.extend_from_slice(b"--bnd\r\ngarbage without header separator");
        let parts = parse_multipart(&body, "bnd");
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].name, "a");
    }
}
