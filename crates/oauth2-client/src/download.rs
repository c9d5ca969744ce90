//! Download destination resolution and stream copy.

use crate::context::CallContext;
use crate::error::{ClientError, Result};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Extract the file name from a `Content-Disposition` header value.
///
/// `filename*` (RFC 5987, percent-encoded) takes precedence over `filename`.
/// Only the final path component is returned, so a server cannot name a
/// file outside the destination directory.
pub(crate) fn filename_from_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for param in split_params(value).into_iter().skip(1) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let raw = raw.trim();

        if key.eq_ignore_ascii_case("filename*") {
            extended = decode_ext_value(raw);
        } else if key.eq_ignore_ascii_case("filename") {
            plain = Some(unquote(raw));
        }
    }

    extended
        .or(plain)
        .and_then(|name| {
            Path::new(&name)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .filter(|name| !name.is_empty())
}

/// Split on `;` outside of quoted strings.
fn split_params(value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                params.push(value.get(start..i).unwrap_or_default());
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(value.get(start..).unwrap_or_default());
    params
}

fn unquote(raw: &str) -> String {
    let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) else {
        return raw.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Decode `charset'lang'percent-encoded` (RFC 5987). Only UTF-8 is accepted.
fn decode_ext_value(raw: &str) -> Option<String> {
    let mut parts = raw.splitn(3, '\'');
    let charset = parts.next()?;
    let _language = parts.next()?;
    let encoded = parts.next()?;

    if !charset.eq_ignore_ascii_case("utf-8") {
        return None;
    }
    urlencoding::decode(encoded).ok().map(|s| s.into_owned())
}

/// Where a download is written.
///
/// An existing directory plus a disposition file name resolves to a file
/// inside that directory; anything else is used verbatim.
pub(crate) async fn resolve_destination(dest: &Path, disposition: Option<&str>) -> PathBuf {
    let is_dir = tokio::fs::metadata(dest)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);

    if is_dir {
        if let Some(name) = disposition.and_then(filename_from_disposition) {
            return dest.join(name);
        }
    }
    dest.to_path_buf()
}

/// Stream the response body into `path` as it arrives.
///
/// A failure partway leaves the partially written file in place.
pub(crate) async fn write_response(
    mut response: reqwest::Response,
    path: &Path,
    ctx: &CallContext,
) -> Result<()> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|source| ClientError::FileCreation {
            path: path.to_path_buf(),
            source,
        })?;

    let io_error = |source: std::io::Error| ClientError::Io {
        path: path.to_path_buf(),
        source,
    };

    loop {
        let chunk = ctx
            .run(async {
                response.chunk().await.map_err(|e| {
                    if e.is_timeout() {
                        ClientError::Timeout
                    } else {
                        io_error(std::io::Error::other(e))
                    }
                })
            })
            .await?;

        let Some(chunk) = chunk else {
            break;
        };
        file.write_all(&chunk).await.map_err(io_error)?;
    }

    file.flush().await.map_err(io_error)
}
