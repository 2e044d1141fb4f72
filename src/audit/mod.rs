//! The tamper-evident audit log: monthly-rotated JSONL files chained by
//! HMAC, with a small sidecar tracking where the chain currently stands.

pub mod chain;
pub mod record;

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::paths::{self, VaultPaths};
use record::{AuditRecord, Operation, OutcomeKind};

const META_SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct AuditMeta {
    schema_version: u32,
    sequence: u64,
    #[serde(rename = "prev_hmac_hex")]
    previous_hmac: String,
}

impl Default for AuditMeta {
    fn default() -> Self {
        Self {
            schema_version: META_SCHEMA_VERSION,
            sequence: 0,
            previous_hmac: String::new(),
        }
    }
}

/// A single append handed back to the caller, in case it wants to log the id.
#[derive(Clone, Debug)]
pub struct Appended {
    pub id: String,
    pub sequence: u64,
}

/// Outcome of walking the whole chain and recomputing every hmac.
#[derive(Clone, Debug, Default)]
pub struct VerifyReport {
    pub records_checked: u64,
    pub first_break: Option<BreakPoint>,
}

impl VerifyReport {
    pub fn is_intact(&self) -> bool {
        self.first_break.is_none()
    }
}

#[derive(Clone, Debug)]
pub struct BreakPoint {
    pub record_id: String,
    pub sequence: u64,
    pub reason: String,
}

#[derive(Clone, Debug, Default)]
pub struct PruneSummary {
    pub files_removed: usize,
    pub records_removed: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

/// Handle to a vault's audit trail. Holds the HKDF-derived audit key in
/// memory only for as long as the vault is unlocked.
pub struct AuditLog {
    paths: VaultPaths,
    audit_key: [u8; 32],
}

impl AuditLog {
    /// Opens (creating if absent) the audit directory and its chain-state
    /// sidecar for `paths.audit_dir()`.
    pub fn open(paths: VaultPaths, audit_key: [u8; 32]) -> Result<Self> {
        if !paths.audit_dir().exists() {
            paths::create_dir_with_mode(&paths.audit_dir(), 0o700)?;
        }
        if !paths.audit_meta().exists() {
            let log = Self { paths, audit_key };
            log.save_meta(&AuditMeta::default())?;
            return Ok(log);
        }
        Ok(Self { paths, audit_key })
    }

    fn load_meta(&self) -> Result<AuditMeta> {
        let path = self.paths.audit_meta();
        if !path.exists() {
            return Ok(AuditMeta::default());
        }
        let contents = fs::read_to_string(&path)?;
        serde_json::from_str(&contents)
            .map_err(|e| Error::AuditCorrupted(format!("audit.meta: {e}")))
    }

    fn save_meta(&self, meta: &AuditMeta) -> Result<()> {
        let path = self.paths.audit_meta();
        let existed = path.exists();
        let body = serde_json::to_string_pretty(meta)?;
        fs::write(&path, body)?;
        if !existed {
            paths::set_mode(&path, 0o600)?;
        }
        Ok(())
    }

    /// Appends a new record for `operation`, sealing it onto the end of the
    /// chain and rotating into the current calendar month's file.
    #[allow(clippy::too_many_arguments)]
    pub fn append(
        &self,
        operation: Operation,
        key: Option<String>,
        key_hash: Option<String>,
        result: OutcomeKind,
        context: BTreeMap<String, String>,
        now: DateTime<Utc>,
    ) -> Result<Appended> {
        let mut meta = self.load_meta()?;
        let sequence = meta.sequence + 1;

        let mut record = AuditRecord {
            schema_version: record::SCHEMA_VERSION,
            id: record::new_record_id(now),
            timestamp: now,
            operation,
            key,
            key_hash,
            actor: record::Actor::default(),
            result,
            context,
            chain: record::Chain {
                sequence: 0,
                previous_hmac: String::new(),
                hmac: String::new(),
            },
        };
        chain::seal_chain(&self.audit_key, &mut record, sequence, &meta.previous_hmac);

        self.append_to_month_file(now, &record)?;

        meta.sequence = sequence;
        meta.previous_hmac = record.chain.hmac.clone();
        self.save_meta(&meta)?;

        Ok(Appended { id: record.id, sequence })
    }

    fn append_to_month_file(&self, now: DateTime<Utc>, record: &AuditRecord) -> Result<()> {
        let path = self.paths.audit_month_file(now.year(), now.month());
        let existed = path.exists();
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if !existed {
            paths::set_mode(&path, 0o600)?;
        }
        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Lists the chain's monthly files in chronological order.
    fn month_files(&self) -> Result<Vec<std::path::PathBuf>> {
        let dir = self.paths.audit_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut files: Vec<_> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| {
                p.extension().and_then(|e| e.to_str()) == Some("jsonl")
            })
            .collect();
        files.sort();
        Ok(files)
    }

    fn read_all_records(&self) -> Result<Vec<AuditRecord>> {
        let mut records = Vec::new();
        for path in self.month_files()? {
            let file = fs::File::open(&path)?;
            for line in BufReader::new(file).lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let record: AuditRecord = serde_json::from_str(&line)
                    .map_err(|e| Error::AuditCorrupted(format!("{}: {e}", path.display())))?;
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Walks every record in sequence order, recomputing each hmac and
    /// checking its link to the previous one. The first surviving record's
    /// own `previous_hmac` is trusted as the chain's origin — pruning drops
    /// older files wholesale, so there is nothing upstream left to check it
    /// against.
    pub fn verify(&self) -> Result<VerifyReport> {
        let records = self.read_all_records()?;
        let mut report = VerifyReport::default();
        let mut previous_hmac: Option<String> = None;

        for record in &records {
            let expected_previous = previous_hmac
                .clone()
                .unwrap_or_else(|| record.chain.previous_hmac.clone());

            if !chain::verify_record(&self.audit_key, record, &expected_previous) {
                report.first_break = Some(BreakPoint {
                    record_id: record.id.clone(),
                    sequence: record.chain.sequence,
                    reason: "hmac or previous-hmac mismatch".to_string(),
                });
                break;
            }

            report.records_checked += 1;
            previous_hmac = Some(record.chain.hmac.clone());
        }

        Ok(report)
    }

    /// Returns every record with `since <= timestamp < until` (either bound
    /// optional), in on-disk order.
    pub fn records(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<AuditRecord>> {
        let records = self.read_all_records()?;
        Ok(records
            .into_iter()
            .filter(|r| since.map(|s| r.timestamp >= s).unwrap_or(true))
            .filter(|r| until.map(|u| r.timestamp < u).unwrap_or(true))
            .collect())
    }

    /// Serializes matching records to `out` in the requested format.
    pub fn export(
        &self,
        format: ExportFormat,
        out: &mut dyn Write,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let records = self.records(since, until)?;
        match format {
            ExportFormat::Json => {
                let body = serde_json::to_string_pretty(&records)?;
                out.write_all(body.as_bytes())?;
            }
            ExportFormat::Csv => {
                writeln!(out, "id,timestamp,operation,key,result,sequence")?;
                for record in &records {
                    writeln!(
                        out,
                        "{},{},{},{},{},{}",
                        record.id,
                        record.timestamp.to_rfc3339(),
                        record.operation.as_str(),
                        record.key.as_deref().unwrap_or(""),
                        record.result.as_str(),
                        record.chain.sequence,
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Reports how many month files and records a prune of everything
    /// strictly before `cutoff`'s calendar month would remove, without
    /// modifying anything.
    pub fn prune_preview(&self, cutoff: DateTime<Utc>) -> Result<PruneSummary> {
        self.prune_impl(cutoff, false)
    }

    /// Deletes every monthly file entirely before `cutoff`'s calendar month.
    /// The sequence counter in `audit.meta` is left untouched — new records
    /// keep counting up from where the chain actually stands; only the
    /// earliest surviving record's `previous_hmac` becomes unverifiable
    /// against anything on disk, which [`Self::verify`] accounts for.
    pub fn prune(&self, cutoff: DateTime<Utc>) -> Result<PruneSummary> {
        self.prune_impl(cutoff, true)
    }

    fn prune_impl(&self, cutoff: DateTime<Utc>, apply: bool) -> Result<PruneSummary> {
        let cutoff_key = (cutoff.year(), cutoff.month());
        let mut summary = PruneSummary::default();

        for path in self.month_files()? {
            let Some((year, month)) = parse_month_filename(&path) else {
                continue;
            };
            if (year, month) >= cutoff_key {
                continue;
            }

            let count = count_lines(&path)?;
            summary.records_removed += count;
            summary.files_removed += 1;
            if apply {
                fs::remove_file(&path)?;
            }
        }

        Ok(summary)
    }
}

fn parse_month_filename(path: &std::path::Path) -> Option<(i32, u32)> {
    let stem = path.file_stem()?.to_str()?;
    let (year_str, month_str) = stem.split_once('-')?;
    let year: i32 = year_str.parse().ok()?;
    let month: u32 = month_str.parse().ok()?;
    Some((year, month))
}

fn count_lines(path: &std::path::Path) -> Result<u64> {
    let file = fs::File::open(path)?;
    let mut count = 0u64;
    for line in BufReader::new(file).lines() {
        if !line?.trim().is_empty() {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn log_at(dir: &std::path::Path) -> AuditLog {
        AuditLog::open(VaultPaths::new(dir), [7u8; 32]).unwrap()
    }

    #[test]
    fn append_then_verify_is_intact() {
        let dir = tempdir().unwrap();
        let log = log_at(dir.path());

        for i in 0..5 {
            log.append(
                Operation::SecretSet,
                Some(format!("key-{i}")),
                Some(format!("hash-{i}")),
                OutcomeKind::Success,
                BTreeMap::new(),
                Utc::now(),
            )
            .unwrap();
        }

        let report = log.verify().unwrap();
        assert!(report.is_intact());
        assert_eq!(report.records_checked, 5);
    }

    #[test]
    fn tampering_with_a_record_breaks_verify() {
        let dir = tempdir().unwrap();
        let log = log_at(dir.path());
        log.append(
            Operation::VaultInit,
            None,
            None,
            OutcomeKind::Success,
            BTreeMap::new(),
            Utc::now(),
        )
        .unwrap();

        let files = log.month_files().unwrap();
        let contents = fs::read_to_string(&files[0]).unwrap();
        let tampered = contents.replace("vault-init", "vault-lock");
        fs::write(&files[0], tampered).unwrap();

        let report = log.verify().unwrap();
        assert!(!report.is_intact());
    }

    #[test]
    fn export_json_contains_every_record() {
        let dir = tempdir().unwrap();
        let log = log_at(dir.path());
        log.append(
            Operation::VaultInit,
            None,
            None,
            OutcomeKind::Success,
            BTreeMap::new(),
            Utc::now(),
        )
        .unwrap();

        let mut buf = Vec::new();
        log.export(ExportFormat::Json, &mut buf, None, None).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("vault-init"));
    }

    #[test]
    fn prune_preview_does_not_delete() {
        let dir = tempdir().unwrap();
        let log = log_at(dir.path());
        log.append(
            Operation::VaultInit,
            None,
            None,
            OutcomeKind::Success,
            BTreeMap::new(),
            Utc::now(),
        )
        .unwrap();

        let far_future = Utc::now() + chrono::Duration::days(400);
        let summary = log.prune_preview(far_future).unwrap();
        assert_eq!(summary.files_removed, 1);
        assert_eq!(log.month_files().unwrap().len(), 1);
    }
}
