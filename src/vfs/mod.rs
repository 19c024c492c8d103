//! Zip-backed virtual files: everything needed to turn an uploaded archive
//! plus a logical request path into servable bytes.

pub mod mime;
pub mod resolve;
pub mod transform;
pub mod zip;

#[cfg(test)]
pub(crate) mod test_zip;

pub use zip::{ZipArchive, ZipEntry};

#[derive(Debug, thiserror::Error)]
pub enum VfsError {
    #[error("not a valid zip archive")]
    CorruptArchive(#[source] anyhow::Error),
    #[error("no archive entry matches the requested path")]
    NotFound,
    #[error("failed to read archive entry data")]
    Read(#[source] anyhow::Error),
}

pub struct ServedFile {
    pub content: Vec<u8>,
    pub content_type: &'static str,
}

impl ServedFile {
    pub fn is_html(&self) -> bool {
        self.content_type == "text/html"
    }
}

/// Resolves `sub_path` inside the archive and produces the final response
/// payload. Callers differ only in how they obtained the archive bytes.
///
/// The MIME type is classified from the resolved entry's name, not the
/// request path: an extensionless route that falls back to the app shell
/// must still be served as HTML.
pub fn serve_archive_path(
    zip_bytes: Vec<u8>,
    sub_path: &str,
    base_path: &str,
) -> Result<ServedFile, VfsError> {
    let archive = ZipArchive::parse(zip_bytes)?;
    let entry = resolve::resolve(archive.entries(), sub_path).ok_or(VfsError::NotFound)?;
    let content = archive.read(entry)?;
    let content = transform::rewrite_html(&entry.name, content, base_path);
    Ok(ServedFile {
        content,
        content_type: mime::content_type_for(&entry.name),
    })
}
