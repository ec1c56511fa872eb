// storage.rs
// Uploaded requirement files live under a public web-servable directory.
// Names embed the owning requirement and a timestamp so concurrent uploads
// never collide; deletes are best-effort.

use anyhow::Result;
use chrono::Local;
use mongodb::bson::oid::ObjectId;
use std::{
    env, fs,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::warn;
use uuid::Uuid;

pub const PROOF_PHOTOS_SUBDIR: &str = "proof-photos";

pub fn uploads_root() -> PathBuf {
    env::var("UPLOADS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./wwwroot/uploads"))
}

pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file")
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// `proof_{requirement}_{timestamp}_{original}` — the department upload name.
pub fn proof_photo_file_name(requirement_id: &ObjectId, original: &str) -> String {
    let stamp = Local::now().format("%Y%m%d%H%M%S%3f");
    format!(
        "proof_{}_{}_{}",
        requirement_id.to_hex(),
        stamp,
        sanitize_file_name(original)
    )
}

/// `{uuid}_{original}` — the document officer's optional-file name.
pub fn unique_file_name(original: &str) -> String {
    format!("{}_{}", Uuid::new_v4(), sanitize_file_name(original))
}

/// Writes the bytes under the proof-photos directory and returns the public
/// path recorded on the photo row.
pub async fn save_proof_photo(file_name: &str, bytes: &[u8]) -> Result<String> {
    let dir = uploads_root().join(PROOF_PHOTOS_SUBDIR);
    tokio::fs::create_dir_all(&dir).await?;
    tokio::fs::write(dir.join(file_name), bytes).await?;
    Ok(format!("/uploads/{PROOF_PHOTOS_SUBDIR}/{file_name}"))
}

/// Resolves a stored `/uploads/...` path back to the on-disk location.
pub fn resolve_upload_path(photo_path: &str) -> PathBuf {
    let relative = photo_path
        .trim_start_matches('/')
        .trim_start_matches("uploads/");
    uploads_root().join(relative)
}

/// Failure to delete the physical file is logged and swallowed; the database
/// row is the source of truth.
pub fn delete_upload_best_effort(photo_path: &str) {
    let path = resolve_upload_path(photo_path);
    if path.exists() {
        if let Err(err) = fs::remove_file(&path) {
            warn!(path = %path.display(), %err, "could not delete uploaded file");
        }
    }
}

pub fn content_type_for(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}

/// Append-only local log lines (email failures, password-change audit).
pub fn append_log_line(file: &str, line: &str) {
    let result = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(file)
        .and_then(|mut f| writeln!(f, "{line}"));
    if let Err(err) = result {
        warn!(file, %err, "could not append to log file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(sanitize_file_name("receipt.jpg"), "receipt.jpg");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("my receipt (1).png"), "my_receipt__1_.png");
        assert_eq!(sanitize_file_name(""), "file");
    }

    #[test]
    fn proof_names_embed_the_requirement() {
        let id = ObjectId::new();
        let name = proof_photo_file_name(&id, "receipt.jpg");
        assert!(name.starts_with(&format!("proof_{}_", id.to_hex())));
        assert!(name.ends_with("_receipt.jpg"));
    }

    #[test]
    fn unique_names_differ_for_the_same_original() {
        assert_ne!(unique_file_name("a.pdf"), unique_file_name("a.pdf"));
    }

    #[test]
    fn content_types_derive_from_extension() {
        assert_eq!(content_type_for("a.JPG"), "image/jpeg");
        assert_eq!(content_type_for("a.pdf"), "application/pdf");
        assert_eq!(content_type_for("a.unknown"), "application/octet-stream");
        assert_eq!(content_type_for("noextension"), "application/octet-stream");
    }

    #[test]
    fn upload_paths_resolve_under_the_root() {
        let path = resolve_upload_path("/uploads/proof-photos/x.jpg");
        assert!(path.ends_with("proof-photos/x.jpg"));
    }
}
