//! Password-change atomicity and audit-log prune/verify-window coverage.

use chrono::Utc;
use tempfile::tempdir;
use vaultkeep_core::{Error, NewSecret, Vault};

fn read_vault_keys_row(db_path: &std::path::Path) -> (Vec<u8>, Vec<u8>) {
    let conn = rusqlite::Connection::open(db_path).unwrap();
    conn.query_row("SELECT salt, encrypted_dek FROM vault_keys WHERE id = 1", [], |row| {
        Ok((row.get(0)?, row.get(1)?))
    })
    .unwrap()
}

#[test]
fn change_password_leaves_a_restorable_backup_file() {
    let dir = tempdir().unwrap();
    let vault_path = dir.path().join("vault");
    let vault = Vault::new(&vault_path);
    vault.init("correct horse battery staple").unwrap();
    vault.unlock("correct horse battery staple").unwrap();
    vault
        .set_secret("k", NewSecret { value: Some("v".to_string()), ..Default::default() })
        .unwrap();

    vault.change_password("correct horse battery staple", "second password here!!").unwrap();

    let backups: Vec<_> = std::fs::read_dir(&vault_path)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains(".backup-"))
        .collect();
    assert_eq!(backups.len(), 1, "change_password must snapshot the store before rewrapping the DEK");
}

#[test]
fn old_password_stops_working_immediately_after_change() {
    let dir = tempdir().unwrap();
    let vault = Vault::new(dir.path().join("vault"));
    vault.init("correct horse battery staple").unwrap();
    vault.unlock("correct horse battery staple").unwrap();
    vault.change_password("correct horse battery staple", "second password here!!").unwrap();
    vault.lock().unwrap();

    assert!(vault.unlock("correct horse battery staple").is_err());
    vault.lock().unwrap();
    assert!(vault.unlock("second password here!!").is_ok());
}

#[test]
fn audit_prune_preview_then_prune_removes_old_month_files_only() {
    let dir = tempdir().unwrap();
    let vault = Vault::new(dir.path().join("vault"));
    vault.init("correct horse battery staple").unwrap();
    vault.unlock("correct horse battery staple").unwrap();
    vault
        .set_secret("k", NewSecret { value: Some("v".to_string()), ..Default::default() })
        .unwrap();

    // Nothing is old enough to prune yet.
    let preview = vault.audit_prune_preview(Utc::now() - chrono::Duration::days(400)).unwrap();
    assert_eq!(preview.files_removed, 0);

    // A cutoff far in the future would remove this month's file.
    let future_cutoff = Utc::now() + chrono::Duration::days(400);
    let preview = vault.audit_prune_preview(future_cutoff).unwrap();
    assert_eq!(preview.files_removed, 1);

    // Still present after only previewing.
    assert!(vault.audit_verify().unwrap().is_intact());

    let applied = vault.audit_prune(future_cutoff).unwrap();
    assert_eq!(applied.files_removed, 1);
    assert!(applied.records_removed >= 1);
}

#[test]
fn change_password_to_the_same_password_is_rejected_without_touching_storage() {
    let dir = tempdir().unwrap();
    let vault_path = dir.path().join("vault");
    let vault = Vault::new(&vault_path);
    vault.init("correct horse battery staple").unwrap();
    vault.unlock("correct horse battery staple").unwrap();
    vault
        .set_secret("k", NewSecret { value: Some("v".to_string()), ..Default::default() })
        .unwrap();

    let db_path = vault_path.join("vault.db");
    let before = read_vault_keys_row(&db_path);

    let err = vault
        .change_password("correct horse battery staple", "correct horse battery staple")
        .unwrap_err();
    assert!(matches!(err, Error::SamePassword));

    let after = read_vault_keys_row(&db_path);
    assert_eq!(before, after, "same-password change must not touch vault_keys");

    let backups: Vec<_> = std::fs::read_dir(&vault_path)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains(".backup-"))
        .collect();
    assert!(backups.is_empty(), "same-password change must be rejected before any backup is taken");
}

#[test]
fn change_password_same_password_on_a_locked_vault_reports_locked_not_same_password() {
    let dir = tempdir().unwrap();
    let vault = Vault::new(dir.path().join("vault"));
    vault.init("correct horse battery staple").unwrap();

    let err = vault
        .change_password("correct horse battery staple", "correct horse battery staple")
        .unwrap_err();
    assert!(matches!(err, Error::VaultLocked));
}

#[test]
fn crash_between_backup_and_commit_leaves_old_password_working() {
    let dir = tempdir().unwrap();
    let vault_path = dir.path().join("vault");
    let vault = Vault::new(&vault_path);
    vault.init("correct horse battery staple").unwrap();
    vault.unlock("correct horse battery staple").unwrap();
    vault
        .set_secret("k", NewSecret { value: Some("v".to_string()), ..Default::default() })
        .unwrap();

    vault.change_password("correct horse battery staple", "second password here!!").unwrap();

    // Find the pre-change snapshot `change_password` took of its own accord,
    // then restore it over the live db — simulating a crash that flushed the
    // backup to disk but never durably committed the rewritten `vault_keys`
    // row.
    let db_path = vault_path.join("vault.db");
    let backups: Vec<_> = std::fs::read_dir(&vault_path)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains(".backup-"))
        .collect();
    assert_eq!(backups.len(), 1);

    vault.lock().unwrap();
    std::fs::copy(backups[0].path(), &db_path).unwrap();

    assert!(vault.unlock("correct horse battery staple").is_ok(), "old password must still open the restored pre-commit snapshot");
    vault.lock().unwrap();
    assert!(vault.unlock("second password here!!").is_err(), "new password must not open the restored pre-commit snapshot");
}

#[test]
fn audit_list_filters_by_time_window() {
    let dir = tempdir().unwrap();
    let vault = Vault::new(dir.path().join("vault"));
    vault.init("correct horse battery staple").unwrap();
    vault.unlock("correct horse battery staple").unwrap();

    let before_secret = Utc::now();
    vault
        .set_secret("k", NewSecret { value: Some("v".to_string()), ..Default::default() })
        .unwrap();

    let only_before = vault.audit_list(None, Some(before_secret)).unwrap();
    assert!(only_before.iter().all(|r| r.operation != vaultkeep_core::Operation::SecretSet));

    let all = vault.audit_list(None, None).unwrap();
    assert!(all.iter().any(|r| r.operation == vaultkeep_core::Operation::SecretSet));
}
