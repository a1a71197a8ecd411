//! Durable keys derived from asset URLs.
//!
//! The website stores image copies under `logo_<base64(url)>` and
//! `news_img_cache_<base64(url)>` (standard alphabet, padded, like `btoa`).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub const LOGO_KEY_PREFIX: &str = "logo_";
pub const NEWS_IMAGE_KEY_PREFIX: &str = "news_img_cache_";

pub fn logo_key(url: &str) -> String {
    format!("{}{}", LOGO_KEY_PREFIX, STANDARD.encode(url))
}

pub fn news_image_key(url: &str) -> String {
    format!("{}{}", NEWS_IMAGE_KEY_PREFIX, STANDARD.encode(url))
}

/// Encode bytes as a `data:` URL.
pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Split a `data:<mime>;base64,<payload>` URL back into MIME type and bytes.
pub fn decode_data_url(url: &str) -> Option<(String, Vec<u8>)> {
    let rest = url.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    let mime = meta.strip_suffix(";base64")?;
    let bytes = STANDARD.decode(payload).ok()?;
    Some((mime.to_string(), bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_match_btoa() {
        // btoa("http://localhost:8000/uploads/logo.png")
        assert_eq!(
            logo_key("http://localhost:8000/uploads/logo.png"),
            "logo_aHR0cDovL2xvY2FsaG9zdDo4MDAwL3VwbG9hZHMvbG9nby5wbmc="
        );
        assert_eq!(news_image_key("a"), "news_img_cache_YQ==");
    }

    #[test]
    fn test_data_url_round_trip() {
        let url = data_url("image/png", &[0x89, b'P', b'N', b'G']);
        assert_eq!(url, "data:image/png;base64,iVBORw==");
        let (mime, bytes) = decode_data_url(&url).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, vec![0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn test_decode_rejects_non_base64_data_urls() {
        assert_eq!(decode_data_url("data:text/plain,hello"), None);
        assert_eq!(decode_data_url("https://x/y.png"), None);
    }
}
