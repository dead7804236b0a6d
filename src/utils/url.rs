//! URL helpers for the two upstream hosts and the controlled origin.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::models::Language;

static SOURCE_HOST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:www\.|kl\.)?(sermitsiaq\.(?:ag|gl))$").unwrap());

static IMAGE_ID_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/(\d+)\.(?:webp|jpe?g|png)(?:$|[?#])").unwrap());

/// Resolve a possibly relative URL against a base URL.
pub fn resolve_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }

    if let Ok(base) = Url::parse(base_url) {
        if let Ok(resolved) = base.join(path) {
            return resolved.to_string();
        }
    }

    let base = base_url.trim_end_matches('/');
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    format!("{}{}", base, path)
}

/// Host of a URL, if it parses.
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}

/// Switch an upstream URL onto the host serving `language`.
///
/// `kl.` serves Greenlandic, `www.` everything else. Returns `None` for
/// URLs that are not on a `sermitsiaq.{ag,gl}` host.
pub fn convert_host(url: &str, language: Language) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let caps = SOURCE_HOST.captures(&host)?;
    let prefix = match language {
        Language::Kl => "kl",
        Language::Da | Language::En => "www",
    };
    let new_host = format!("{}.{}", prefix, &caps[1]);
    parsed.set_host(Some(&new_host)).ok()?;
    Some(parsed.to_string())
}

/// Swap between the `kl.` and `www.` hosts.
pub fn swap_host(url: &str) -> Option<String> {
    let host = host_of(url)?;
    if host.starts_with("kl.") {
        convert_host(url, Language::Da)
    } else {
        convert_host(url, Language::Kl)
    }
}

/// Path component of a URL after normalizing `kl.` onto `www.`.
pub fn normalized_path(url: &str) -> Option<String> {
    let normalized = convert_host(url, Language::Da).unwrap_or_else(|| url.to_string());
    let parsed = Url::parse(&normalized).ok()?;
    let path = parsed.path().trim_end_matches('/');
    if path.is_empty() {
        None
    } else {
        Some(path.to_string())
    }
}

/// Numeric image identifier from `imageId=N` or a `/N.ext` filename.
pub fn extract_image_id(url: &str) -> Option<String> {
    if let Ok(parsed) = Url::parse(url) {
        if let Some((_, value)) = parsed.query_pairs().find(|(k, _)| k == "imageId") {
            if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
                return Some(value.into_owned());
            }
        }
    }
    IMAGE_ID_PATH.captures(url).map(|c| c[1].to_string())
}

/// The `/section/slug/id` parts of an article URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticlePath {
    pub section: Option<String>,
    pub slug: Option<String>,
    pub article_id: Option<String>,
}

/// Split an article URL into section, slug and trailing numeric id.
pub fn split_article_path(url: &str) -> ArticlePath {
    let path = Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.split(['?', '#']).next().unwrap_or("").to_string());
    let segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            urlencoding::decode(s)
                .map(|d| d.into_owned())
                .unwrap_or_else(|_| s.to_string())
        })
        .collect();

    let (article_id, rest) = match segments.split_last() {
        Some((last, rest)) if last.chars().all(|c| c.is_ascii_digit()) => {
            (Some(last.to_string()), rest)
        }
        _ => (None, segments.as_slice()),
    };

    let slug = if article_id.is_some() {
        rest.last().map(|s| s.to_string())
    } else {
        None
    };
    let section = if rest.len() > 1 || (article_id.is_none() && !rest.is_empty()) {
        rest.first().map(|s| s.to_string())
    } else {
        None
    };

    ArticlePath {
        section,
        slug,
        article_id,
    }
}

/// Replace scheme and host with those of `domain`.
///
/// `domain` may be a bare host or a full origin.
pub fn rewrite_host(url: &str, domain: &str) -> String {
    let origin = if domain.contains("://") {
        domain.to_string()
    } else {
        format!("https://{}", domain)
    };
    let (Ok(mut parsed), Ok(target)) = (Url::parse(url), Url::parse(&origin)) else {
        return url.to_string();
    };
    if parsed.set_scheme(target.scheme()).is_err() {
        return url.to_string();
    }
    if parsed.set_host(target.host_str()).is_err() {
        return url.to_string();
    }
    let _ = parsed.set_port(target.port());
    parsed.to_string()
}

/// Whether `url` is already served from `origin`.
pub fn is_on_origin(url: &str, origin: &str) -> bool {
    match (host_of(url), host_of(origin)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Source domain (`sermitsiaq.ag`) of an upstream URL.
pub fn source_domain(url: &str) -> Option<String> {
    let host = host_of(url)?;
    SOURCE_HOST.captures(&host).map(|c| c[1].to_string())
}
