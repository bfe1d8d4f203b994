use std::path::Path;

use docrag_core::types::DocumentKind;
use docrag_core::{Error, Result};

pub const MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// What an accepted upload becomes: a title and a format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub title: String,
    pub kind: DocumentKind,
}

/// Accept `.pdf`, `.docx`, `.md` and `.txt` files up to [`MAX_UPLOAD_BYTES`].
/// The title is the file stem.
pub fn validate_upload(path: &Path, size: u64) -> Result<Upload> {
    let kind = DocumentKind::from_path(path).ok_or_else(|| {
        let allowed: Vec<_> = DocumentKind::ALL.iter().map(|k| format!(".{}", k.extension())).collect();
        Error::UploadRejected(format!("{}: file type not supported, allowed: {}", path.display(), allowed.join(", ")))
    })?;
    if size > MAX_UPLOAD_BYTES {
        return Err(Error::UploadRejected(format!(
            "{}: file size {size} bytes exceeds the {} MiB limit",
            path.display(),
            MAX_UPLOAD_BYTES / (1024 * 1024)
        )));
    }
    let title = path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::UploadRejected(format!("{}: file has no name", path.display())))?;
    Ok(Upload { title: title.to_string(), kind })
}
