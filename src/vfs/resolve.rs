//! Finds the archive entry backing a logical request path.
//!
//! Build tools emit their output under `dist/` or `build/`; stripping one
//! such leading segment lets either convention be uploaded as-is. Paths
//! without an extension that match nothing fall back to the app shell so
//! client-side-routed deep links keep working.

use super::zip::ZipEntry;

// One leading build-output segment is stripped during normalization
const OUTPUT_PREFIXES: [&str; 2] = ["dist/", "build/"];

// Archiver junk, never servable
const EXCLUDED_MARKERS: [&str; 2] = ["__MACOSX", ".DS_Store"];

pub struct NormalizedEntry<'a> {
    pub entry: &'a ZipEntry,
    pub name: String,
}

/// Non-directory entries paired with their normalized names: backslashes
/// folded to forward slashes, one leading output prefix stripped.
pub fn normalize_entries(entries: &[ZipEntry]) -> Vec<NormalizedEntry<'_>> {
    entries
        .iter()
        .filter(|e| !e.is_dir && !EXCLUDED_MARKERS.iter().any(|m| e.name.contains(m)))
        .map(|entry| {
            let mut name = entry.name.replace('\\', "/");
            for prefix in OUTPUT_PREFIXES {
                if let Some(rest) = name.strip_prefix(prefix) {
                    name = rest.to_owned();
                    break;
                }
            }
            NormalizedEntry { entry, name }
        })
        .collect()
}

/// Resolution chain, first match wins: exact name, then `{path}/index.html`
/// for extensionless paths, then any `index.html` anywhere in the archive
/// for paths that look like client-side routes.
pub fn resolve<'a>(entries: &'a [ZipEntry], requested: &str) -> Option<&'a ZipEntry> {
    let requested = requested.strip_prefix('/').unwrap_or(requested);
    let normalized = normalize_entries(entries);

    if let Some(hit) = normalized.iter().find(|e| e.name == requested) {
        return Some(hit.entry);
    }

    let routable = !requested.contains('.');
    if routable {
        let dir = requested.strip_suffix('/').unwrap_or(requested);
        let index = format!("{dir}/index.html");
        if let Some(hit) = normalized.iter().find(|e| e.name == index) {
            return Some(hit.entry);
        }
    }
    if routable || requested == "index.html" {
        return normalized.iter().find(|e| is_index(&e.name)).map(|e| e.entry);
    }
    None
}

/// Whether the archive contains a servable app shell; uploads without one
/// are rejected before they ever reach the store.
pub fn has_root_index(entries: &[ZipEntry]) -> bool {
    normalize_entries(entries).iter().any(|e| is_index(&e.name))
}

fn is_index(name: &str) -> bool {
    name == "index.html" || name.ends_with("/index.html")
}
