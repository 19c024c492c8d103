//! Extension-based content-type classification for served entries.

/// Maps a file name to a response content type by its extension,
/// case-insensitively. Unknown or missing extensions fall back to
/// `application/octet-stream`.
pub fn content_type_for(name: &str) -> &'static str {
    let ext = match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => return "application/octet-stream",
    };
    match ext.as_str() {
        "html" | "htm" => "text/html",
        "js" | "mjs" => "application/javascript",
        "json" | "map" => "application/json",
        "css" => "text/css",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "eot" => "application/vnd.ms-fontobject",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_web_extensions() {
        assert_eq!(content_type_for("dist/index.html"), "text/html");
        assert_eq!(content_type_for("assets/app.js"), "application/javascript");
        assert_eq!(content_type_for("assets/app.js.map"), "application/json");
        assert_eq!(content_type_for("styles.css"), "text/css");
        assert_eq!(content_type_for("logo.svg"), "image/svg+xml");
        assert_eq!(content_type_for("favicon.ico"), "image/x-icon");
        assert_eq!(content_type_for("font.woff2"), "font/woff2");
    }

    #[test]
    fn extension_lookup_is_case_insensitive() {
        assert_eq!(content_type_for("INDEX.HTML"), "text/html");
        assert_eq!(content_type_for("Photo.JPG"), "image/jpeg");
    }

    #[test]
    fn unknown_and_missing_extensions_fall_back() {
        assert_eq!(content_type_for("archive.tar"), "application/octet-stream");
        assert_eq!(content_type_for("LICENSE"), "application/octet-stream");
    }
}
