//! Image URL normalization.
//!
//! The backend has stored image paths in several shapes over time. Both the
//! gallery and the news pages collapse them into one of: a pass-through URL,
//! an absolute URL on the backend origin with a cache-busting `?t=`, or a
//! static placeholder.
//!
//! | stored value                               | resolved                                   |
//! |--------------------------------------------|--------------------------------------------|
//! | empty / missing                            | placeholder                                |
//! | `http://<origin>/images/x.jpg`             | `/images/x.jpg`                            |
//! | `/uploads/images/gallery/x.jpg`            | `<origin>/uploads/images/gallery/x.jpg?t=` |
//! | `uploads/images/gallery/x.jpg`             | `<origin>/uploads/images/gallery/x.jpg?t=` |
//! | `/images/x.jpg`                            | unchanged                                  |
//! | `x.jpg`                                    | `<origin>/uploads/images/<kind>/x.jpg?t=`  |
//! | other `http(s)://` or `data:` URL          | unchanged                                  |
//! | anything else                              | placeholder                                |

/// Which page the image belongs to; selects upload folder and placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Gallery,
    News,
}

impl ImageKind {
    pub fn placeholder(&self) -> &'static str {
        match self {
            ImageKind::Gallery => "/images/gallery-placeholder.jpg",
            ImageKind::News => "/images/news-placeholder.jpg",
        }
    }

    fn upload_dir(&self) -> &'static str {
        match self {
            ImageKind::Gallery => "uploads/images/gallery",
            ImageKind::News => "uploads/images/news",
        }
    }
}

const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "webp", "svg", "bmp"];

pub fn gallery_image_url(raw: Option<&str>, origin: &str, ts: i64) -> String {
    resolve_image_url(raw, origin, ts, ImageKind::Gallery)
}

pub fn news_image_url(raw: Option<&str>, origin: &str, ts: i64) -> String {
    resolve_image_url(raw, origin, ts, ImageKind::News)
}

/// Resolve a stored image path; `ts` is the cache-busting timestamp.
pub fn resolve_image_url(raw: Option<&str>, origin: &str, ts: i64, kind: ImageKind) -> String {
    let raw = match raw.map(str::trim) {
        Some(r) if !r.is_empty() => r,
        _ => return kind.placeholder().to_string(),
    };
    let origin = origin.trim_end_matches('/');

    if let Some(path) = strip_origin(raw, origin) {
        if path.starts_with("/images/") {
            return path.to_string();
        }
        if path.starts_with("/uploads/") {
            return with_timestamp(&format!("{}{}", origin, path), ts);
        }
        return raw.to_string();
    }

    if raw.starts_with("http://") || raw.starts_with("https://") || raw.starts_with("data:") {
        return raw.to_string();
    }
    if raw.starts_with("/uploads/") {
        return with_timestamp(&format!("{}{}", origin, raw), ts);
    }
    if raw.starts_with("uploads/") {
        return with_timestamp(&format!("{}/{}", origin, raw), ts);
    }
    if raw.starts_with("/images/") {
        return raw.to_string();
    }
    if is_bare_file_name(raw) {
        return with_timestamp(&format!("{}/{}/{}", origin, kind.upload_dir(), raw), ts);
    }

    kind.placeholder().to_string()
}

fn strip_origin<'a>(raw: &'a str, origin: &str) -> Option<&'a str> {
    raw.strip_prefix(origin).filter(|rest| rest.starts_with('/'))
}

fn with_timestamp(url: &str, ts: i64) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}t={}", url, separator, ts)
}

fn is_bare_file_name(raw: &str) -> bool {
    if raw.contains('/') || raw.contains('\\') || raw.contains(char::is_whitespace) {
        return false;
    }
    match raw.rsplit_once('.') {
        Some((stem, ext)) => {
            !stem.is_empty() && IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
        }
        None => false,
    }
}
