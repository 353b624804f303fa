//! URL canonicalization for matching and history bookkeeping.

/// Marker for URLs produced by tab-suspender extensions.
const SUSPENDED_PAGE: &str = "suspended.html";

/// Query key under which suspenders stash the original URL.
const SUSPENDED_URI_KEY: &str = "uri=";

/// New-tab filter literal. Kept exactly as shipped (including the embedded
/// space) because stored fingerprints were computed against it; changing it
/// would orphan every saved session hash.
const NEW_TAB_PAGE: &str = "chrome:// newtab/";

/// Canonicalizes a tab URL for fingerprinting and history comparisons.
///
/// An empty return value means "ignore this URL": it contributes nothing to
/// a session fingerprint and is never recorded in history.
///
/// Rules, applied in order:
///
/// 1. Empty input stays empty.
/// 2. URLs mentioning this extension's own id anywhere are dropped. This is
///    a substring test over the whole URL, not a host check.
/// 3. The new-tab page is dropped.
/// 4. Suspended tabs are unwrapped to the original URL they wrap.
/// 5. The fragment is removed.
/// 6. The query string is removed.
pub fn clean_url(raw: &str, extension_id: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    if !extension_id.is_empty() && raw.contains(extension_id) {
        return String::new();
    }

    if raw.contains(NEW_TAB_PAGE) {
        return String::new();
    }

    let mut url = raw;
    if url.contains(SUSPENDED_PAGE) {
        if let Some(pos) = url.find(SUSPENDED_URI_KEY) {
            url = &url[pos + SUSPENDED_URI_KEY.len()..];
        }
    }

    let url = url.split('#').next().unwrap_or_default();
    let url = url.split('?').next().unwrap_or_default();

    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXT_ID: &str = "abcdefghijklmnop";

    #[test]
    fn empty_input_is_empty() {
        assert_eq!(clean_url("", EXT_ID), "");
    }

    #[test]
    fn strips_fragment() {
        assert_eq!(
            clean_url("https://example.com/page#section", EXT_ID),
            "https://example.com/page"
        );
    }

    #[test]
    fn strips_query() {
        assert_eq!(
            clean_url("https://example.com/page?q=1&r=2", EXT_ID),
            "https://example.com/page"
        );
    }

    #[test]
    fn strips_query_and_fragment() {
        assert_eq!(
            clean_url("https://example.com/page#frag?notquery", EXT_ID),
            "https://example.com/page"
        );
        assert_eq!(
            clean_url("https://example.com/page?q=1#frag", EXT_ID),
            "https://example.com/page"
        );
    }

    #[test]
    fn drops_own_extension_pages() {
        let url = format!("chrome-extension://{}/popup.html", EXT_ID);
        assert_eq!(clean_url(&url, EXT_ID), "");
    }

    /// The extension-id test is a substring match over the full URL, so a
    /// foreign URL that merely mentions the id in its path is also dropped.
    /// Observed behavior, locked in here.
    #[test]
    fn extension_id_matches_anywhere_in_url() {
        let url = format!("https://example.com/search?q={}", EXT_ID);
        assert_eq!(clean_url(&url, EXT_ID), "");
    }

    #[test]
    fn empty_extension_id_does_not_drop_everything() {
        assert_eq!(
            clean_url("https://example.com/page", ""),
            "https://example.com/page"
        );
    }

    /// The new-tab filter literal contains an embedded space, so the real
    /// new-tab URL passes through unchanged. Shipped behavior; stored
    /// fingerprints depend on it.
    #[test]
    fn real_new_tab_url_passes_through() {
        assert_eq!(clean_url("chrome://newtab/", EXT_ID), "chrome://newtab/");
    }

    #[test]
    fn spaced_new_tab_literal_is_dropped() {
        assert_eq!(clean_url("chrome:// newtab/", EXT_ID), "");
    }

    #[test]
    fn unwraps_suspended_tabs() {
        assert_eq!(
            clean_url(
                "chrome-extension://X/suspended.html#ttl=t&pos=0&uri=https://example.com/page?q=1",
                EXT_ID
            ),
            "https://example.com/page"
        );
    }

    #[test]
    fn suspended_without_uri_key_is_not_unwrapped() {
        assert_eq!(
            clean_url("https://example.com/suspended.html", EXT_ID),
            "https://example.com/suspended.html"
        );
    }

    #[test]
    fn plain_url_is_returned_verbatim() {
        assert_eq!(
            clean_url("https://example.com", EXT_ID),
            "https://example.com"
        );
    }
}
