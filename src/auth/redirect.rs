//! Open-redirect guard for the `next` parameter of the login form.
//!
//! A target is accepted when it is either
//! - a path on this site: starts with a single `/` (not `//`, not `/\`), or
//! - an absolute `http`/`https` URL without credentials whose host and
//!   explicit port equal those of the request's `Host` header.
//!
//! Subdomains never match, other schemes never match, and control characters
//! or backslashes anywhere reject the target outright.

use reqwest::Url;

pub fn is_safe_url(target: &str, request_host: Option<&str>) -> bool {
    let target = target.trim();
    if target.is_empty() || target.contains('\\') || target.chars().any(char::is_control) {
        return false;
    }

    if target.starts_with('/') {
        return !target.starts_with("//");
    }

    let Ok(url) = Url::parse(target) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    if !url.username().is_empty() || url.password().is_some() {
        return false;
    }

    let Some(host) = request_host else {
        return false;
    };
    let Ok(own) = Url::parse(&format!("http://{host}")) else {
        return false;
    };

    // Url lowercases hosts and drops scheme-default ports.
    url.host_str().is_some() && url.host_str() == own.host_str() && url.port() == own.port()
}
