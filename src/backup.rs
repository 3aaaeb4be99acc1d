use crate::db::{init_schema, DB_FILE};
use crate::state::Snapshot;
use anyhow::{anyhow, bail, Context};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const DB_ENTRY: &str = "db/attendance.sqlite3";
pub const BUNDLE_FORMAT: &str = "attendance-workspace-v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub format: String,
    pub app_version: String,
    pub exported_at: String,
    pub db_sha256: String,
    pub db_bytes: u64,
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Writes the workspace database and a checksummed manifest to a zip bundle.
pub fn export_bundle(workspace: &Path, out_path: &Path) -> anyhow::Result<Manifest> {
    let db_path = workspace.join(DB_FILE);
    let db_bytes = std::fs::read(&db_path)
        .with_context(|| format!("failed to read database {}", db_path.display()))?;

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let out_file = File::create(out_path)
        .with_context(|| format!("failed to create bundle {}", out_path.display()))?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = Manifest {
        format: BUNDLE_FORMAT.to_string(),
        app_version: env!("CARGO_PKG_VERSION").to_string(),
        exported_at: chrono::Utc::now().to_rfc3339(),
        db_sha256: sha256_hex(&db_bytes),
        db_bytes: db_bytes.len() as u64,
    };
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(serde_json::to_string_pretty(&manifest)?.as_bytes())
        .context("failed to write manifest entry")?;

    zip.start_file(DB_ENTRY, opts)
        .context("failed to start database entry")?;
    zip.write_all(&db_bytes)
        .context("failed to write database entry")?;
    zip.finish().context("failed to finalize bundle")?;

    Ok(manifest)
}

/// Opens an extracted database and loads every table through the same
/// mapping the workspace uses.
fn check_database(path: &Path) -> anyhow::Result<()> {
    let conn = Connection::open(path)
        .with_context(|| format!("failed to open extracted database {}", path.display()))?;
    init_schema(&conn).context("bundle database is not a usable SQLite database")?;
    Snapshot::load(&conn).context("bundle database rows could not be read")?;
    Ok(())
}

/// Replaces the workspace database with the one in `in_path`.
///
/// The checksum and the database itself are verified before anything in
/// the workspace is touched.
/// The caller must have closed its connection to the workspace database.
pub fn import_bundle(in_path: &Path, workspace: &Path) -> anyhow::Result<Manifest> {
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.display()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: Manifest =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid")?;
    if manifest.format != BUNDLE_FORMAT {
        bail!("unsupported bundle format: {}", manifest.format);
    }

    let mut db_bytes = Vec::new();
    archive
        .by_name(DB_ENTRY)
        .with_context(|| format!("bundle missing {DB_ENTRY}"))?
        .read_to_end(&mut db_bytes)
        .context("failed to extract database entry")?;
    let actual = sha256_hex(&db_bytes);
    if actual != manifest.db_sha256 {
        return Err(anyhow!(
            "database checksum mismatch: manifest {}, bundle {}",
            manifest.db_sha256,
            actual
        ));
    }

    std::fs::create_dir_all(workspace)
        .with_context(|| format!("failed to create workspace {}", workspace.display()))?;
    let dst = workspace.join(DB_FILE);
    let tmp = workspace.join(format!("{DB_FILE}.importing"));
    std::fs::write(&tmp, &db_bytes)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    if let Err(e) = check_database(&tmp) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    std::fs::rename(&tmp, &dst)
        .with_context(|| format!("failed to move extracted database to {}", dst.display()))?;

    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_dir(prefix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("{}-{}", prefix, uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn bundle_restores_database_bytes() {
        let src = temp_dir("attendance-backup-src");
        let dst = temp_dir("attendance-backup-dst");
        drop(crate::db::open_db(&src).expect("seed"));
        let original = std::fs::read(src.join(DB_FILE)).expect("read source");
        let bundle = src.join("out").join("backup.zip");

        let exported = export_bundle(&src, &bundle).expect("export");
        let imported = import_bundle(&bundle, &dst).expect("import");
        assert_eq!(exported.db_sha256, imported.db_sha256);
        assert_eq!(std::fs::read(dst.join(DB_FILE)).expect("read"), original);
    }

    fn write_bundle(path: &Path, db_bytes: &[u8], db_sha256: String) {
        let mut zip = ZipWriter::new(File::create(path).expect("create"));
        let opts = FileOptions::default();
        let manifest = Manifest {
            format: BUNDLE_FORMAT.to_string(),
            app_version: "0".into(),
            exported_at: "now".into(),
            db_sha256,
            db_bytes: db_bytes.len() as u64,
        };
        zip.start_file(MANIFEST_ENTRY, opts).expect("start");
        zip.write_all(serde_json::to_string(&manifest).expect("json").as_bytes())
            .expect("write");
        zip.start_file(DB_ENTRY, opts).expect("start");
        zip.write_all(db_bytes).expect("write");
        zip.finish().expect("finish");
    }

    #[test]
    fn non_sqlite_payload_leaves_workspace_alone() {
        let dir = temp_dir("attendance-backup-garbage");
        let bundle = dir.join("garbage.zip");
        let payload = b"checksummed but not a database".repeat(8);
        write_bundle(&bundle, &payload, sha256_hex(&payload));
        std::fs::write(dir.join(DB_FILE), b"keep me").expect("seed");

        let e = import_bundle(&bundle, &dir).expect_err("not sqlite");
        assert!(format!("{e:#}").contains("not a usable SQLite database"));
        assert_eq!(std::fs::read(dir.join(DB_FILE)).expect("read"), b"keep me");
        assert!(!dir.join(format!("{DB_FILE}.importing")).exists());
    }

    #[test]
    fn checksum_mismatch_leaves_workspace_alone() {
        let dir = temp_dir("attendance-backup-bad");
        let bundle = dir.join("bad.zip");
        write_bundle(&bundle, b"abc", "0".repeat(64));
        std::fs::write(dir.join(DB_FILE), b"keep me").expect("seed");

        let e = import_bundle(&bundle, &dir).expect_err("mismatch");
        assert!(format!("{e:#}").contains("checksum mismatch"));
        assert_eq!(std::fs::read(dir.join(DB_FILE)).expect("read"), b"keep me");
    }
}
