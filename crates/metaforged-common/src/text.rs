//! String helpers for titles, names and artwork URIs.
//!
//! These turn noisy host-supplied values into something providers and the
//! fuzzy matcher can work with: appended years, `image://` wrapped
//! thumbnails and track names with featuring credits.

/// Prefix the host media database wraps around cached artwork paths.
const IMAGE_WRAPPER: &str = "image://";

/// Marker the host inserts for music artwork inside the wrapper.
const MUSIC_MARKER: &str = "music@";

/// Separators that introduce a featuring credit in track or album names.
const FEATURING_MARKERS: &[&str] = &["ft.", "Ft.", "feat.", "Feat.", "featuring", "Featuring"];

/// Cut a title at the first ` (`, dropping an appended year or note.
///
/// ```
/// use metaforged_common::text::strip_bracket_suffix;
///
/// assert_eq!(strip_bracket_suffix("Alien (1979)"), "Alien");
/// assert_eq!(strip_bracket_suffix("(500) Days of Summer"), "(500) Days of Summer");
/// ```
pub fn strip_bracket_suffix(title: &str) -> &str {
    match title.find(" (") {
        Some(idx) => &title[..idx],
        None => title,
    }
}

/// Strip featuring credits and bracketed suffixes from a track or album name.
///
/// ```
/// use metaforged_common::text::clean_title;
///
/// assert_eq!(clean_title("Hello (Remastered)"), "Hello");
/// assert_eq!(clean_title("Song ft. Someone"), "Song");
/// assert_eq!(clean_title("A/B"), "A");
/// ```
pub fn clean_title(title: &str) -> String {
    let mut title = title;
    for cut in ["/", "(", "["] {
        if let Some(idx) = title.find(cut) {
            title = &title[..idx];
        }
    }
    for marker in FEATURING_MARKERS {
        if let Some(idx) = title.find(marker) {
            title = &title[..idx];
        }
    }
    title.trim().to_string()
}

/// Unwrap a host `image://` artwork reference into a plain path or URL.
///
/// Values without the wrapper are returned unchanged.
///
/// ```
/// use metaforged_common::text::clean_image;
///
/// assert_eq!(
///     clean_image("image://http%3a%2f%2fexample.com%2fposter.jpg/"),
///     "http://example.com/poster.jpg"
/// );
/// assert_eq!(clean_image("/media/poster.jpg"), "/media/poster.jpg");
/// ```
pub fn clean_image(image: &str) -> String {
    if !image.contains(IMAGE_WRAPPER) {
        return image.to_string();
    }
    let stripped = image.replace(IMAGE_WRAPPER, "").replace(MUSIC_MARKER, "");
    let mut decoded = match urlencoding::decode(&stripped) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => stripped,
    };
    if decoded.ends_with('/') {
        decoded.pop();
    }
    decoded
}

/// Normalize a name for case-insensitive comparison.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}
