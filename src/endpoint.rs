//! Base-URL normalization for OpenAI-compatible servers.
//!
//! Users hand the clients whatever address they have at hand: a bare
//! `host:port`, a URL with a trailing slash, or the address of a sibling
//! service such as `http://host:8000/vram`.  Everything from the first `v1`
//! or `vram` path segment onward is dropped before the fixed API paths are
//! appended.

use url::Url;

use crate::error::{Error, Result};

/// Path of the chat completions endpoint relative to the base URL.
pub const CHAT_COMPLETIONS_PATH: &str = "v1/chat/completions";

/// Path of the model listing endpoint relative to the base URL.
pub const MODELS_PATH: &str = "v1/models";

/// Path segments that mark the start of a known suffix to strip.
const SUFFIX_SEGMENTS: [&str; 2] = ["v1", "vram"];

/// Normalize a user-supplied address into the server's base URL.
///
/// The result always ends in `/`, so relative joins append to it.
pub fn resolve_base(base_url: &str) -> Result<Url> {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Err(Error::config(
            "base URL is empty",
            Some("url".to_string()),
        ));
    }
    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else if trimmed.contains("://") {
        return Err(Error::config(
            format!("unsupported URL scheme in {trimmed}"),
            Some("url".to_string()),
        ));
    } else {
        format!("http://{trimmed}")
    };

    let mut url = Url::parse(&with_scheme)
        .map_err(|e| Error::url(format!("invalid base URL {trimmed}: {e}"), Some(e)))?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::config(
            format!("base URL {trimmed} has no host"),
            Some("url".to_string()),
        ));
    }

    let kept: Vec<String> = url
        .path_segments()
        .map(|segments| {
            segments
                .take_while(|segment| !SUFFIX_SEGMENTS.contains(segment))
                .filter(|segment| !segment.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();
    let mut path = String::from("/");
    for segment in kept {
        path.push_str(&segment);
        path.push('/');
    }
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Resolve the chat completions endpoint for a user-supplied address.
///
/// ```
/// # use vllm_chat::endpoint::resolve_endpoint;
/// let url = resolve_endpoint("http://host:8000/vram").unwrap();
/// assert_eq!(url.as_str(), "http://host:8000/v1/chat/completions");
/// ```
pub fn resolve_endpoint(base_url: &str) -> Result<Url> {
    join(&resolve_base(base_url)?, CHAT_COMPLETIONS_PATH)
}

/// Resolve the model listing endpoint for a user-supplied address.
pub fn models_endpoint(base_url: &str) -> Result<Url> {
    join(&resolve_base(base_url)?, MODELS_PATH)
}

pub(crate) fn join(base: &Url, path: &str) -> Result<Url> {
    base.join(path)
        .map_err(|e| Error::url(format!("cannot append {path} to {base}: {e}"), Some(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_vram_suffix() {
        assert_eq!(
            resolve_endpoint("http://host:8000/vram").unwrap().as_str(),
            "http://host:8000/v1/chat/completions"
        );
    }

    #[test]
    fn strips_trailing_slash_and_v1() {
        assert_eq!(
            resolve_endpoint("http://localhost:8000/").unwrap().as_str(),
            "http://localhost:8000/v1/chat/completions"
        );
        assert_eq!(
            resolve_endpoint("http://localhost:8000/v1").unwrap().as_str(),
            "http://localhost:8000/v1/chat/completions"
        );
        assert_eq!(
            resolve_endpoint("http://localhost:8000/v1/chat/completions")
                .unwrap()
                .as_str(),
            "http://localhost:8000/v1/chat/completions"
        );
        assert_eq!(
            resolve_endpoint("http://localhost:8000/vram/stream?x=1")
                .unwrap()
                .as_str(),
            "http://localhost:8000/v1/chat/completions"
        );
    }

    #[test]
    fn adds_missing_scheme() {
        assert_eq!(
            resolve_endpoint("192.168.1.100:8000").unwrap().as_str(),
            "http://192.168.1.100:8000/v1/chat/completions"
        );
    }

    #[test]
    fn keeps_proxy_prefix() {
        assert_eq!(
            resolve_endpoint("https://gateway.example.com/inference/v1")
                .unwrap()
                .as_str(),
            "https://gateway.example.com/inference/v1/chat/completions"
        );
    }

    #[test]
    fn host_named_like_a_suffix_survives() {
        assert_eq!(
            resolve_endpoint("http://v1.example.com").unwrap().as_str(),
            "http://v1.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn models_path() {
        assert_eq!(
            models_endpoint("localhost:8000/").unwrap().as_str(),
            "http://localhost:8000/v1/models"
        );
    }

    #[test]
    fn rejects_malformed() {
        assert!(resolve_endpoint("").unwrap_err().is_config());
        assert!(resolve_endpoint("   ").unwrap_err().is_config());
        assert!(resolve_endpoint("ftp://host/").unwrap_err().is_config());
        assert!(resolve_endpoint("http://").unwrap_err().is_config());
        assert!(resolve_endpoint("http://exa mple.com").unwrap_err().is_config());
    }
}
