use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, ORIGIN, REFERER,
    USER_AGENT,
};

/// Build mobile-shop headers for an activity probe
///
/// Creates a HeaderMap matching what the shop's mobile page sends when it
/// calls the activity API from the browser.
///
/// # Arguments
///
/// * `user_agent` - User agent of the active identity
/// * `origin` - Origin of the shop front-end
/// * `referer` - Shop page the request appears to come from
///
/// # Examples
///
/// ```
/// use vidscan::scan::headers::build_probe_headers;
///
/// let headers = build_probe_headers(
///     "Mozilla/5.0 (iPhone; CPU iPhone OS 17_5 like Mac OS X)",
///     "https://shop.m.jd.com",
///     "https://shop.m.jd.com/shop/home?venderId=1000001",
/// );
/// assert!(headers.contains_key("referer"));
/// ```
pub fn build_probe_headers(user_agent: &str, origin: &str, referer: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if let Ok(value) = HeaderValue::from_str(user_agent) {
        headers.insert(USER_AGENT, value);
    }
    if let Ok(value) = HeaderValue::from_str(origin) {
        headers.insert(ORIGIN, value);
    }
    if let Ok(value) = HeaderValue::from_str(referer) {
        headers.insert(REFERER, value);
    }
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json,text/plain,*/*"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("zh-CN,zh;q=0.9"));
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/x-www-form-urlencoded"),
    );

    // Sec-Fetch headers for a cross-site XHR
    headers.insert(
        HeaderName::from_static("sec-fetch-dest"),
        HeaderValue::from_static("empty"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-mode"),
        HeaderValue::from_static("cors"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-site"),
        HeaderValue::from_static("same-site"),
    );

    headers
}

/// Headers for the warm-up page load
pub fn build_navigation_headers(user_agent: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if let Ok(value) = HeaderValue::from_str(user_agent) {
        headers.insert(USER_AGENT, value);
    }
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("zh-CN,zh;q=0.9"));
    headers.insert(
        HeaderName::from_static("sec-fetch-dest"),
        HeaderValue::from_static("document"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-mode"),
        HeaderValue::from_static("navigate"),
    );

    headers
}

/// Shop home page used as the referer for a vendor
///
/// # Examples
///
/// ```
/// use vidscan::scan::headers::shop_referer;
///
/// let referer = shop_referer("https://shop.m.jd.com/shop/home", "1000001");
/// assert_eq!(referer, "https://shop.m.jd.com/shop/home?venderId=1000001");
/// ```
pub fn shop_referer(base: &str, vendor_id: &str) -> String {
    format!("{base}?venderId={vendor_id}")
}
