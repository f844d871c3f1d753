//! Redirect target resolution.
//!
//! When an access policy turns a request away, the visitor goes to the
//! caller-supplied `redirect_to` parameter if it survives sanitization,
//! otherwise to the site root.

use url::Url;

use crate::host::{HostEnv, HostRequest};

/// Resolve where a denied request should be sent.
pub fn redirect_target(request: &dyn HostRequest, env: &dyn HostEnv) -> String {
    request
        .param("redirect_to")
        .filter(|raw| !raw.is_empty())
        .and_then(|raw| sanitize_redirect(&raw))
        .unwrap_or_else(|| env.site_root())
}

/// Percent-decode and vet a redirect candidate.
///
/// Accepted: site-relative paths (`/...`, but never scheme-relative
/// `//...`) and absolute http/https URLs. Anything else is discarded and
/// the caller falls back to the site root.
pub fn sanitize_redirect(raw: &str) -> Option<String> {
    let decoded = urlencoding::decode(raw).ok()?;
    let candidate = decoded.trim();
    if candidate.is_empty()
        || candidate
            .chars()
            .any(|c| c.is_control() || c.is_whitespace())
    {
        return None;
    }
    if candidate.starts_with("//") {
        return None;
    }
    if candidate.starts_with('/') {
        return Some(candidate.to_owned());
    }
    let url = Url::parse(candidate).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::{MemoryEnv, MemoryRequest};

    #[test]
    fn relative_paths_survive_decoding() {
        assert_eq!(sanitize_redirect("/profile").as_deref(), Some("/profile"));
        assert_eq!(
            sanitize_redirect("%2Fprofile%3Ftab%3Dfiles").as_deref(),
            Some("/profile?tab=files")
        );
    }

    #[test]
    fn host_values_get_exactly_one_more_decode() {
        let env = MemoryEnv::new();

        // Hosts hand parameters over in their own convention; one decode
        // layer is applied here either way.
        let plain = MemoryRequest::new("GET").with_param("redirect_to", "/welcome");
        assert_eq!(redirect_target(&plain, &env), "/welcome");

        let layered = MemoryRequest::new("GET").with_param("redirect_to", "%2Fwelcome");
        assert_eq!(redirect_target(&layered, &env), "/welcome");
    }

    #[test]
    fn hostile_candidates_are_discarded() {
        assert_eq!(sanitize_redirect("//evil.example/x"), None);
        assert_eq!(sanitize_redirect("javascript:alert(1)"), None);
        assert_eq!(sanitize_redirect("/pro%0Afile"), None);
        assert_eq!(sanitize_redirect("   "), None);
        assert_eq!(sanitize_redirect("not a url"), None);
    }

    #[test]
    fn absolute_http_urls_are_kept() {
        assert_eq!(
            sanitize_redirect("https://example.com/next").as_deref(),
            Some("https://example.com/next")
        );
        assert_eq!(sanitize_redirect("ftp://example.com/next"), None);
    }

    #[test]
    fn target_falls_back_to_the_site_root() {
        let env = MemoryEnv {
            site_root: "https://example.com/".to_owned(),
            ..MemoryEnv::new()
        };

        let with_param = MemoryRequest::new("GET").with_param("redirect_to", "/profile");
        assert_eq!(redirect_target(&with_param, &env), "/profile");

        let bad_param = MemoryRequest::new("GET").with_param("redirect_to", "//evil.example");
        assert_eq!(redirect_target(&bad_param, &env), "https://example.com/");

        let bare = MemoryRequest::new("GET");
        assert_eq!(redirect_target(&bare, &env), "https://example.com/");
    }
}
