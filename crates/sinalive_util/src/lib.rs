#![forbid(unsafe_code)]

pub mod live_page {
	/// Live page URL prefixes the room scraper is known to understand.
	pub const KNOWN_LIVE_PAGE_PREFIXES: &[&str] = &["http://kan.sina.com.cn/u/", "http://www.kanyouxi.com/u/"];

	/// True when `url` looks like a Sina Live room page.
	pub fn is_known_live_page_url(url: &str) -> bool {
		KNOWN_LIVE_PAGE_PREFIXES.iter().any(|p| url.starts_with(p))
	}

}
