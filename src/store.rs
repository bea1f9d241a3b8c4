//! Extension store URLs
//!
//! Recognises store detail pages and builds direct package download URLs.

use lazy_static::lazy_static;
use regex::Regex;

use crate::packager::identity::ExtensionId;

lazy_static! {
    static ref CWS_DETAIL: Regex = Regex::new(
        r"(?i)^https?://(?:chrome\.google\.com/webstore|chromewebstore\.google\.com)/detail/(?:[^/?#]+/)?([a-p]{32})(?:[/?#]|$)"
    ).unwrap();
    static ref EDGE_DETAIL: Regex = Regex::new(
        r"(?i)^https?://microsoftedge\.microsoft\.com/addons/detail/(?:[^/?#]+/)?([a-p]{32})(?:[/?#]|$)"
    ).unwrap();
    static ref AMO_DETAIL: Regex = Regex::new(
        r"(?i)^https?://addons\.mozilla\.org/(?:[^/?#]+/)?(?:firefox|android)/addon/([^/?#]+)"
    ).unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Store {
    ChromeWebStore,
    Edge,
}

/// Store and extension ID of a Chrome Web Store or Edge add-ons detail page.
pub fn extension_id_from_url(url: &str) -> Option<(Store, ExtensionId)> {
    let (store, captures) = CWS_DETAIL
        .captures(url)
        .map(|c| (Store::ChromeWebStore, c))
        .or_else(|| EDGE_DETAIL.captures(url).map(|c| (Store::Edge, c)))?;
    ExtensionId::parse(&captures[1]).map(|id| (store, id))
}

/// Direct CRX download URL served by the store's update service.
pub fn crx_download_url(store: Store, id: &ExtensionId, chrome_version: &str) -> String {
    match store {
        Store::ChromeWebStore => format!(
            "https://clients2.google.com/service/update2/crx?response=redirect\
             &prodversion={}&acceptformat=crx2,crx3&x=id%3D{}%26uc",
            chrome_version, id
        ),
        Store::Edge => format!(
            "https://edge.microsoft.com/extensionwebstorebase/v1/crx?response=redirect\
             &prod=chromiumcrx&prodchannel=&x=id%3D{}%26installsource%3Dondemand%26uc",
            id
        ),
    }
}

/// Add-on slug (or numeric ID) of an addons.mozilla.org detail page.
pub fn amo_slug_from_url(url: &str) -> Option<String> {
    AMO_DETAIL.captures(url).map(|c| c[1].to_string())
}

pub fn xpi_download_url(slug: &str) -> String {
    format!(
        "https://addons.mozilla.org/firefox/downloads/latest/{}/latest.xpi",
        slug
    )
}

/// Maps a store detail page to its package URL; other URLs are returned as-is.
pub fn resolve_download_url(url: &str, chrome_version: &str) -> String {
    if let Some((store, id)) = extension_id_from_url(url) {
        return crx_download_url(store, &id, chrome_version);
    }
    if let Some(slug) = amo_slug_from_url(url) {
        return xpi_download_url(&slug);
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("https://chromewebstore.google.com/detail/metamask/nkbihfbeogaeaoehlefnkodbefgpgknn", Store::ChromeWebStore ; "new store")]
    #[test_case("https://chrome.google.com/webstore/detail/metamask/nkbihfbeogaeaoehlefnkodbefgpgknn?hl=en", Store::ChromeWebStore ; "old store with query")]
    #[test_case("https://chromewebstore.google.com/detail/nkbihfbeogaeaoehlefnkodbefgpgknn", Store::ChromeWebStore ; "without slug")]
    #[test_case("https://microsoftedge.microsoft.com/addons/detail/metamask/nkbihfbeogaeaoehlefnkodbefgpgknn", Store::Edge ; "edge")]
    fn test_extension_id_from_url(url: &str, store: Store) {
        let (found_store, id) = extension_id_from_url(url).unwrap();
        assert_eq!(found_store, store);
        assert_eq!(id.as_str(), "nkbihfbeogaeaoehlefnkodbefgpgknn");
    }

    #[test]
    fn test_non_store_urls() {
        assert!(extension_id_from_url("https://example.com/nkbihfbeogaeaoehlefnkodbefgpgknn").is_none());
        assert!(extension_id_from_url("https://chromewebstore.google.com/detail/x/nkbihfbeogaeaoehlefnkodbefgpgknnx").is_none());
    }

    #[test]
    fn test_crx_download_url() {
        let id = ExtensionId::parse("nkbihfbeogaeaoehlefnkodbefgpgknn").unwrap();
        assert_eq!(
            crx_download_url(Store::ChromeWebStore, &id, "130.0.0.0"),
            "https://clients2.google.com/service/update2/crx?response=redirect&prodversion=130.0.0.0\
             &acceptformat=crx2,crx3&x=id%3Dnkbihfbeogaeaoehlefnkodbefgpgknn%26uc"
        );
        assert!(crx_download_url(Store::Edge, &id, "130.0.0.0").starts_with("https://edge.microsoft.com/"));
    }

    #[test]
    fn test_amo_urls() {
        let url = "https://addons.mozilla.org/en-US/firefox/addon/ublock-origin/";
        assert_eq!(amo_slug_from_url(url).as_deref(), Some("ublock-origin"));
        assert_eq!(
            resolve_download_url(url, "130.0.0.0"),
            "https://addons.mozilla.org/firefox/downloads/latest/ublock-origin/latest.xpi"
        );
    }

    #[test]
    fn test_resolve_leaves_direct_urls() {
        let url = "https://example.com/files/ext.crx";
        assert_eq!(resolve_download_url(url, "130.0.0.0"), url);
    }
}
