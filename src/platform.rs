//! Maps a social-media URL to a short platform label.

use url::Url;

const KNOWN_PLATFORMS: &[(&str, &[&str])] = &[
    ("x", &["x.com", "twitter.com", "t.co"]),
    ("facebook", &["facebook.com", "fb.me", "fb.watch"]),
    ("instagram", &["instagram.com", "instagr.am"]),
    ("youtube", &["youtube.com", "youtu.be"]),
    ("tiktok", &["tiktok.com"]),
    ("linkedin", &["linkedin.com"]),
    ("reddit", &["reddit.com"]),
];

// Second-level labels that sit under a country code, as in `bbc.co.uk`.
const SECOND_LEVEL_SUFFIXES: &[&str] = &["co", "com", "org", "net", "gov", "ac", "edu"];

/// Returns the platform label for `url`, or an empty string when the URL
/// has no host.
///
/// Known networks get their fixed label. Anything else is named after its
/// registrable domain label, e.g. `news.example.co.uk` becomes `example`.
pub fn classify(url: &str) -> String {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return String::new();
    };
    let Some(host) = parsed.host_str() else {
        return String::new();
    };
    let host = host.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    for (label, domains) in KNOWN_PLATFORMS {
        if domains.iter().any(|domain| host_matches(host, domain)) {
            return (*label).to_string();
        }
    }

    fallback_label(host)
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|rest| rest.ends_with('.'))
}

fn fallback_label(host: &str) -> String {
    let parts: Vec<&str> = host.split('.').filter(|part| !part.is_empty()).collect();
    match parts.as_slice() {
        [] => String::new(),
        [single] => (*single).to_string(),
        [.., third, second, _] if SECOND_LEVEL_SUFFIXES.contains(second) => (*third).to_string(),
        [.., second, _] => (*second).to_string(),
    }
}
