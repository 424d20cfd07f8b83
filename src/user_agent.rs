//! Shared User-Agent string for every provider client.

/// Project URL for User-Agent identification (good citizenship; RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/fierce/upstream";

/// Default User-Agent for outbound API requests.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("upstream/{version} (+{PROJECT_UA_URL})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_contains_version_and_url() {
        let ua = default_user_agent();
        assert!(ua.contains(PROJECT_UA_URL));
        assert_eq!(
            env!("CARGO_PKG_VERSION"),
            ua.strip_prefix("upstream/")
                .and_then(|s| s.split(' ').next())
                .expect("UA has version"),
        );
    }
}
