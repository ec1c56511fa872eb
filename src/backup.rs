// backup.rs
// On-demand and scheduled backups: a best-effort text dump of every
// collection, plus a zip of all requirement photos grouped by client name.

use anyhow::{Context, Result};
use chrono::Local;
use futures::stream::TryStreamExt;
use mongodb::bson::{Document, doc};
use serde::Serialize;
use std::{
    env,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tracing::{error, info};
use zip::{ZipWriter, write::SimpleFileOptions};

use crate::state::AppState;
use crate::storage::{resolve_upload_path, sanitize_file_name, uploads_root};

pub fn backup_dir() -> PathBuf {
    env::var("BACKUP_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./Backups"))
}

fn timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

const COLLECTION_NAMES: &[&str] = &[
    "users",
    "clients",
    "permit_requirements",
    "requirement_photos",
    "recurring_expenses",
    "expense_payments",
    "expenses",
];

/// Dumps every collection as one JSON document per line under a section
/// header. Not a point-in-time database backup, but restorable by hand.
pub async fn create_data_backup(state: &AppState) -> Result<PathBuf> {
    let dir = backup_dir();
    fs::create_dir_all(&dir)?;
    let path = dir.join(format!("casetrack_data_backup_{}.txt", timestamp()));
    let mut file = File::create(&path)?;

    writeln!(file, "-- Casetrack data backup")?;
    writeln!(file, "-- Generated on: {}", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(file)?;

    for name in COLLECTION_NAMES {
        writeln!(file, "-- Collection: {name}")?;
        let collection = collection_by_name(state, name);
        let mut cursor = collection.find(doc! {}).await?;
        while let Some(document) = cursor.try_next().await? {
            writeln!(file, "{}", serde_json::to_string(&document)?)?;
        }
        writeln!(file)?;
    }
    writeln!(file, "-- Backup completed")?;

    info!(path = %path.display(), "data backup created");
    Ok(path)
}

fn collection_by_name(state: &AppState, name: &str) -> mongodb::Collection<Document> {
    match name {
        "users" => state.users.clone_with_type(),
        "clients" => state.clients.clone_with_type(),
        "permit_requirements" => state.requirements.clone_with_type(),
        "requirement_photos" => state.requirement_photos.clone_with_type(),
        "recurring_expenses" => state.recurring_expenses.clone_with_type(),
        "expense_payments" => state.expense_payments.clone_with_type(),
        _ => state.expenses.clone_with_type(),
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out);
        } else {
            out.push(path);
        }
    }
}

/// Zips every requirement photo grouped by (sanitized) client name, appends
/// any orphaned upload files, and finishes with a manifest entry.
pub async fn create_files_backup(state: &AppState) -> Result<PathBuf> {
    let dir = backup_dir();
    fs::create_dir_all(&dir)?;
    let path = dir.join(format!("casetrack_client_files_{}.zip", timestamp()));

    // client id -> name, requirement id -> client id
    let mut client_names = std::collections::HashMap::new();
    let mut cursor = state.clients.find(doc! {}).await?;
    while let Some(client) = cursor.try_next().await? {
        if let Some(id) = client.id {
            client_names.insert(id, client.client_name);
        }
    }
    let mut requirement_clients = std::collections::HashMap::new();
    let mut cursor = state.requirements.find(doc! {}).await?;
    while let Some(requirement) = cursor.try_next().await? {
        if let Some(id) = requirement.id {
            requirement_clients.insert(id, requirement.client_id);
        }
    }

    let file = File::create(&path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();

    let mut archived = std::collections::HashSet::new();
    let mut per_client: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

    let mut cursor = state.requirement_photos.find(doc! {}).await?;
    while let Some(photo) = cursor.try_next().await? {
        let client_name = requirement_clients
            .get(&photo.requirement_id)
            .and_then(|cid| client_names.get(cid))
            .cloned()
            .unwrap_or_else(|| "Unknown_Client".to_string());
        let disk_path = resolve_upload_path(&photo.photo_path);
        let Ok(bytes) = fs::read(&disk_path) else {
            continue;
        };
        let file_name = disk_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();
        let entry = format!("Clients/{}/{}", sanitize_file_name(&client_name), file_name);
        zip.start_file(entry, options)?;
        zip.write_all(&bytes)?;
        archived.insert(disk_path);
        *per_client.entry(client_name).or_default() += 1;
    }

    // Orphaned files in the uploads tree that no photo row references
    let uploads = uploads_root();
    let mut all_files = Vec::new();
    collect_files(&uploads, &mut all_files);
    for file_path in all_files {
        if archived.contains(&file_path) {
            continue;
        }
        let Ok(relative) = file_path.strip_prefix(&uploads) else {
            continue;
        };
        let Ok(bytes) = fs::read(&file_path) else {
            continue;
        };
        let entry = format!("Orphaned_Files/{}", relative.display());
        zip.start_file(entry, options)?;
        zip.write_all(&bytes)?;
    }

    zip.start_file("backup_manifest.txt", options)?;
    writeln!(zip, "Casetrack client files backup")?;
    writeln!(zip, "Generated: {}", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(zip, "Total clients: {}", per_client.len())?;
    writeln!(zip)?;
    for (client, count) in &per_client {
        writeln!(zip, "Client: {client} ({count} files)")?;
    }
    zip.finish()?;

    info!(path = %path.display(), "client files backup created");
    Ok(path)
}

pub async fn create_full_backup(state: &AppState) -> Result<(PathBuf, PathBuf)> {
    let data = create_data_backup(state).await?;
    let files = create_files_backup(state).await?;
    Ok((data, files))
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupInfo {
    pub backup_type: String,
    pub file_name: String,
    pub file_path: String,
    pub file_size_bytes: u64,
    pub created: String,
}

pub fn backup_history() -> Result<Vec<BackupInfo>> {
    let dir = backup_dir();
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut history = Vec::new();
    for entry in fs::read_dir(&dir)?.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        if !(name.ends_with(".txt") || name.ends_with(".zip")) {
            continue;
        }
        let metadata = entry.metadata()?;
        let backup_type = if name.contains("data_backup") {
            "Data"
        } else if name.contains("client_files") {
            "ClientFiles"
        } else {
            "Unknown"
        };
        let created = metadata
            .modified()
            .map(|t| chrono::DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        history.push(BackupInfo {
            backup_type: backup_type.to_string(),
            file_name: name,
            file_path: path.display().to_string(),
            file_size_bytes: metadata.len(),
            created,
        });
    }
    history.sort_by(|a, b| b.created.cmp(&a.created));
    Ok(history)
}

/// Refuses anything outside the backup directory; deleting a missing
/// artifact is reported as false, not an error.
pub fn delete_backup(file_path: &str) -> Result<bool> {
    let dir = backup_dir().canonicalize().context("backup dir missing")?;
    let target = match Path::new(file_path).canonicalize() {
        Ok(path) => path,
        Err(_) => return Ok(false),
    };
    if !target.starts_with(&dir) {
        return Ok(false);
    }
    fs::remove_file(&target)?;
    Ok(true)
}

/// Interval-driven backup job. Disabled unless BACKUP_ENABLED=true.
pub fn spawn_backup_scheduler(state: Arc<AppState>) {
    let enabled = env::var("BACKUP_ENABLED")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if !enabled {
        info!("backup scheduling disabled");
        return;
    }
    let interval_hours: u64 = env::var("BACKUP_INTERVAL_HOURS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(24);
    let backup_type = env::var("BACKUP_TYPE").unwrap_or_else(|_| "full".to_string());

    info!(interval_hours, backup_type, "backup scheduler started");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_hours * 3600));
        ticker.tick().await; // first tick completes immediately
        loop {
            ticker.tick().await;
            let result = match backup_type.to_lowercase().as_str() {
                "data" => create_data_backup(&state).await.map(|_| ()),
                "files" => create_files_backup(&state).await.map(|_| ()),
                _ => create_full_backup(&state).await.map(|_| ()),
            };
            match result {
                Ok(()) => info!("scheduled backup completed"),
                Err(err) => error!(%err, "scheduled backup failed"),
            }
        }
    });
}
