//! The tamper-evident HMAC chain binding every audit record to its
//! predecessor.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::record::{AuditRecord, Chain};

type HmacSha256 = Hmac<Sha256>;

/// Canonical serialization fed to the chain HMAC:
/// `id | operation | key-or-hmac | timestamp | result | sequence | previous-hmac`.
pub fn canonical_string(record: &AuditRecord, sequence: u64, previous_hmac: &str) -> String {
    let key_or_hmac = record
        .key_hash
        .as_deref()
        .or(record.key.as_deref())
        .unwrap_or("");

    format!(
        "{}|{}|{}|{}|{}|{}|{}",
        record.id,
        record.operation.as_str(),
        key_or_hmac,
        record.timestamp.to_rfc3339(),
        record.result.as_str(),
        sequence,
        previous_hmac,
    )
}

/// Computes `HMAC-SHA256(audit_key, canonical_string(...))`, hex-encoded.
pub fn compute_hmac(
    audit_key: &[u8; 32],
    record: &AuditRecord,
    sequence: u64,
    previous_hmac: &str,
) -> String {
    let mut mac = HmacSha256::new_from_slice(audit_key).expect("HMAC accepts any key length");
    mac.update(canonical_string(record, sequence, previous_hmac).as_bytes());
    hex_encode(&mac.finalize().into_bytes())
}

/// Seals `record` in place: fills in its `chain` field given the sequence
/// number and the previous record's hmac (empty string for sequence 1).
pub fn seal_chain(audit_key: &[u8; 32], record: &mut AuditRecord, sequence: u64, previous_hmac: &str) {
    let hmac = compute_hmac(audit_key, record, sequence, previous_hmac);
    record.chain = Chain {
        sequence,
        previous_hmac: previous_hmac.to_string(),
        hmac,
    };
}

/// Recomputes and checks a record's own hmac and its link to `previous_hmac`.
pub fn verify_record(audit_key: &[u8; 32], record: &AuditRecord, previous_hmac: &str) -> bool {
    if record.chain.previous_hmac != previous_hmac {
        return false;
    }
    let expected = compute_hmac(audit_key, record, record.chain.sequence, previous_hmac);
    expected == record.chain.hmac
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::record::{Actor, Operation, OutcomeKind};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn sample_record() -> AuditRecord {
        AuditRecord {
            schema_version: 1,
            id: "000001".to_string(),
            timestamp: Utc::now(),
            operation: Operation::SecretSet,
            key: Some("api/openai".to_string()),
            key_hash: Some("deadbeef".to_string()),
            actor: Actor::default(),
            result: OutcomeKind::Success,
            context: BTreeMap::new(),
            chain: Chain {
                sequence: 0,
                previous_hmac: String::new(),
                hmac: String::new(),
            },
        }
    }

    #[test]
    fn seal_then_verify_roundtrips() {
        let key = [1u8; 32];
        let mut record = sample_record();
        seal_chain(&key, &mut record, 1, "");
        assert!(verify_record(&key, &record, ""));
    }

    #[test]
    fn tamper_breaks_verification() {
        let key = [1u8; 32];
        let mut record = sample_record();
        seal_chain(&key, &mut record, 1, "");
        record.result = OutcomeKind::Error;
        assert!(!verify_record(&key, &record, ""));
    }

    #[test]
    fn wrong_predecessor_breaks_verification() {
        let key = [1u8; 32];
        let mut record = sample_record();
        seal_chain(&key, &mut record, 2, "abc123");
        assert!(!verify_record(&key, &record, "different"));
    }
}
