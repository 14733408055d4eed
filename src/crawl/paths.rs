//! URL bookkeeping for the crawl: root normalization, entry joins,
//! relative paths and the root folder name.

use std::borrow::Cow;

use url::Url;

use super::CrawlError;

/// Folder name used when neither the listing nor the URL yields one.
pub const FALLBACK_ROOT_FOLDER: &str = "dufs";

/// Normalizes a user-supplied root URL so that it ends with `/`.
///
/// The serialized result is the root prefix that every relative path is
/// computed against.
///
/// # Errors
///
/// Returns [`CrawlError::EmptyUrl`] for blank input and
/// [`CrawlError::InvalidRootUrl`] when the URL cannot serve as a base.
pub fn normalize_root_url(raw: &str) -> Result<Url, CrawlError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CrawlError::EmptyUrl);
    }

    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };

    let url = Url::parse(&with_slash).map_err(|_| CrawlError::invalid_root_url(trimmed))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(CrawlError::invalid_root_url(trimmed));
    }
    Ok(url)
}

/// Derives the local top-level folder name for a crawl.
///
/// The listing's `href` is percent-decoded and trimmed of separators. When
/// that leaves nothing (the server root `/`), the last non-empty segment of
/// the root URL path is used instead. The result is then passed through
/// [`sanitize_folder_name`].
#[must_use]
pub fn root_folder_name(root: &Url, href: &str) -> String {
    let from_href = decode_lossy(href);
    let trimmed = from_href.trim_matches('/');
    let derived = if trimmed.is_empty() {
        let path = decode_lossy(root.path());
        path.split('/')
            .rfind(|segment| !segment.is_empty())
            .unwrap_or_default()
            .to_string()
    } else {
        trimmed.to_string()
    };
    sanitize_folder_name(&derived, root)
}

/// Drops empty, `.` and `..` components from a derived folder name.
///
/// Both `/` and `\` separate components; the surviving components are joined
/// with `/` so that a nested server prefix stays nested locally. An empty
/// result falls back to the URL host and finally to [`FALLBACK_ROOT_FOLDER`].
#[must_use]
pub fn sanitize_folder_name(name: &str, root: &Url) -> String {
    let components: Vec<&str> = name
        .split(['/', '\\'])
        .filter(|c| !c.is_empty() && *c != "." && *c != "..")
        .collect();
    if !components.is_empty() {
        return components.join("/");
    }

    root.host_str()
        .filter(|host| !host.is_empty())
        .map_or_else(|| FALLBACK_ROOT_FOLDER.to_string(), str::to_string)
}

/// Returns true when a listing entry name is safe to join onto a directory.
///
/// Names that would walk out of the directory (`.`, `..`) or smuggle a
/// separator are rejected.
#[must_use]
pub fn is_safe_entry_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// Joins a raw entry name onto a directory URL.
///
/// # Errors
///
/// Returns the parse error when the escaped name does not form a valid URL.
pub fn entry_url(directory: &Url, name: &str) -> Result<Url, url::ParseError> {
    directory.join(&urlencoding::encode(name))
}

/// Turns an entry URL into a directory URL by appending `/`.
#[must_use]
pub fn as_directory_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Computes the decoded path of `url` relative to `root_prefix`.
///
/// A URL outside the root prefix yields its whole decoded form.
#[must_use]
pub fn relative_path(root_prefix: &str, url: &str) -> String {
    decode_lossy(url.strip_prefix(root_prefix).unwrap_or(url))
}

/// Percent-decodes `value`, replacing invalid UTF-8 sequences.
#[must_use]
pub fn decode_lossy(value: &str) -> String {
    match urlencoding::decode(value) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => match urlencoding::decode_binary(value.as_bytes()) {
            Cow::Borrowed(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            Cow::Owned(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        },
    }
}
