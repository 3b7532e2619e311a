//! Serving file content to HTTP-style clients.
//!
//! Transport-neutral: takes the relevant request headers, returns a status,
//! response headers, and body. The stored MD5 digest doubles as the entity
//! tag, so conditional requests never touch the content store.

use std::io::SeekFrom;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::digest;
use crate::error::VfsResult;
use crate::file::FileDoc;
use crate::vfs::Vfs;

/// The request headers content serving looks at.
#[derive(Debug, Clone, Default)]
pub struct ContentRequest {
    pub range: Option<String>,
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ContentResponse {
    fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    fn header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.push((name.to_string(), value.into()));
    }

    /// First value of a header, case-insensitively.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// `inline` or `attachment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Inline,
    Attachment,
}

impl Disposition {
    fn as_str(self) -> &'static str {
        match self {
            Disposition::Inline => "inline",
            Disposition::Attachment => "attachment",
        }
    }
}

/// `Content-Disposition` value with both the plain `filename` parameter
/// (non-ASCII and quoting characters replaced) and the RFC 5987 encoded
/// `filename*` one.
pub fn content_disposition(disposition: Disposition, filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let mut encoded = String::with_capacity(filename.len());
    for b in filename.bytes() {
        if b.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&b) {
            encoded.push(b as char);
        } else {
            encoded.push_str(&format!("%{b:02X}"));
        }
    }
    format!(
        "{}; filename=\"{ascii}\"; filename*=UTF-8''{encoded}",
        disposition.as_str()
    )
}

/// HTTP date (`Sun, 06 Nov 1994 08:49:37 GMT`).
pub fn http_date(t: DateTime<Utc>) -> String {
    t.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn parse_http_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(s.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// A single byte range resolved against the content length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteRange {
    /// Inclusive bounds.
    Satisfiable(u64, u64),
    Unsatisfiable,
    /// Malformed or multi-range: serve the whole content. An inverted
    /// range (`bytes=4-2`) is unsatisfiable, not malformed.
    Ignored,
}

fn parse_range(header: &str, size: u64) -> ByteRange {
    let Some(range_set) = header.trim().strip_prefix("bytes=") else {
        return ByteRange::Ignored;
    };
    if range_set.contains(',') {
        return ByteRange::Ignored;
    }
    let Some((start, end)) = range_set.trim().split_once('-') else {
        return ByteRange::Ignored;
    };
    match (start.trim(), end.trim()) {
        ("", "") => ByteRange::Ignored,
        ("", suffix) => match suffix.parse::<u64>() {
            Ok(0) => ByteRange::Unsatisfiable,
            Ok(_) if size == 0 => ByteRange::Unsatisfiable,
            Ok(n) => ByteRange::Satisfiable(size.saturating_sub(n), size - 1),
            Err(_) => ByteRange::Ignored,
        },
        (start, end) => {
            let Ok(start) = start.parse::<u64>() else {
                return ByteRange::Ignored;
            };
            if start >= size {
                return ByteRange::Unsatisfiable;
            }
            if end.is_empty() {
                return ByteRange::Satisfiable(start, size - 1);
            }
            match end.parse::<u64>() {
                Ok(end) if end >= start => ByteRange::Satisfiable(start, end.min(size - 1)),
                Ok(_) => ByteRange::Unsatisfiable,
                Err(_) => ByteRange::Ignored,
            }
        }
    }
}

impl Vfs {
    /// Answer a content request for `doc`.
    ///
    /// Handles `If-None-Match` and `If-Modified-Since` (304), a single
    /// `Range` (206, or 416 when unsatisfiable), and plain requests (200).
    pub async fn serve_file_content(
        &self,
        doc: &mut FileDoc,
        request: &ContentRequest,
        disposition: Option<Disposition>,
    ) -> VfsResult<ContentResponse> {
        let mut headers = Vec::new();
        headers.push(("Content-Type".to_string(), doc.mime.clone()));
        if let Some(d) = disposition {
            headers.push((
                "Content-Disposition".to_string(),
                content_disposition(d, &doc.name),
            ));
        }
        let etag = match (&request.range, &doc.md5sum) {
            (None, Some(md5)) => Some(format!("\"{}\"", digest::encode(md5))),
            _ => None,
        };
        if let Some(etag) = &etag {
            headers.push(("ETag".to_string(), etag.clone()));
        }
        headers.push(("Last-Modified".to_string(), http_date(doc.updated_at)));
        headers.push(("Accept-Ranges".to_string(), "bytes".to_string()));

        if not_modified(request, etag.as_deref(), doc.updated_at) {
            let mut resp = ContentResponse::new(304);
            resp.headers = headers;
            return Ok(resp);
        }

        // Ranges are resolved against the stored bytes, so a size in the
        // document that disagrees with the content cannot produce a
        // Content-Range the body does not match.
        let path = doc.path(self).await?;
        let size = self.fs().stat(&path).await?.size;
        if doc.size >= 0 && doc.size as u64 != size {
            warn!(%path, declared = doc.size, stored = size, "document size disagrees with content");
        }
        let range = request
            .range
            .as_deref()
            .map_or(ByteRange::Ignored, |r| parse_range(r, size));

        let mut file = self.open_file(doc).await?;
        let mut resp = match range {
            ByteRange::Unsatisfiable => {
                let mut resp = ContentResponse::new(416);
                resp.headers = headers;
                resp.header("Content-Range", format!("bytes */{size}"));
                resp
            }
            ByteRange::Satisfiable(start, end) => {
                file.seek(SeekFrom::Start(start)).await?;
                let want = (end - start + 1) as usize;
                let mut body = vec![0u8; want];
                let mut filled = 0;
                while filled < want {
                    let n = file.read(&mut body[filled..]).await?;
                    if n == 0 {
                        break;
                    }
                    filled += n;
                }
                body.truncate(filled);
                let mut resp = ContentResponse::new(206);
                resp.headers = headers;
                resp.header("Content-Range", format!("bytes {start}-{end}/{size}"));
                resp.body = body;
                resp
            }
            ByteRange::Ignored => {
                let mut resp = ContentResponse::new(200);
                resp.headers = headers;
                resp.body = file.read_to_end().await?;
                resp
            }
        };
        file.close().await?;
        let length = resp.body.len().to_string();
        resp.header("Content-Length", length);
        Ok(resp)
    }
}

fn not_modified(request: &ContentRequest, etag: Option<&str>, updated_at: DateTime<Utc>) -> bool {
    if let Some(inm) = &request.if_none_match {
        let Some(etag) = etag else {
            return false;
        };
        return inm
            .split(',')
            .map(str::trim)
            .any(|candidate| candidate == "*" || candidate.trim_start_matches("W/") == etag);
    }
    match request.if_modified_since.as_deref().and_then(parse_http_date) {
        // HTTP dates have second precision
        Some(since) => updated_at.timestamp() <= since.timestamp(),
        None => false,
    }
}
