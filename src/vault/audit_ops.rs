//! Read access to the unlocked vault's audit trail (spec §6's
//! `audit-list` / `audit-verify` / `audit-export` / `audit-prune` entries).

use std::io::Write;

use chrono::{DateTime, Utc};

use crate::audit::record::AuditRecord;
use crate::audit::{ExportFormat, PruneSummary, VerifyReport};
use crate::error::Result;

use super::Vault;

impl Vault {
    /// Returns audit records within `[since, until)`, either bound optional.
    pub fn audit_list(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<AuditRecord>> {
        self.with_unlocked(|unlocked| unlocked.audit.records(since, until))
    }

    /// Walks the whole chain, recomputing every hmac link.
    pub fn audit_verify(&self) -> Result<VerifyReport> {
        self.with_unlocked(|unlocked| unlocked.audit.verify())
    }

    pub fn audit_export(
        &self,
        format: ExportFormat,
        out: &mut dyn Write,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.with_unlocked(|unlocked| unlocked.audit.export(format, out, since, until))
    }

    /// Reports what a prune of everything before `older_than`'s calendar
    /// month would remove, without deleting anything.
    pub fn audit_prune_preview(&self, older_than: DateTime<Utc>) -> Result<PruneSummary> {
        self.with_unlocked(|unlocked| unlocked.audit.prune_preview(older_than))
    }

    pub fn audit_prune(&self, older_than: DateTime<Utc>) -> Result<PruneSummary> {
        self.with_unlocked(|unlocked| unlocked.audit.prune(older_than))
    }
}
