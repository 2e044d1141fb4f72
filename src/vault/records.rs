//! Secret CRUD and listing (spec §4.3). Listing operations that return
//! metadata only never decrypt `encrypted_fields` / `encrypted_value`.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::audit::record::{self, Operation};
use crate::audit::OutcomeKind;
use crate::crypto;
use crate::diskspace;
use crate::error::{Error, Result};
use crate::storage::secrets::{self, SecretRow};

use super::fields::{self, Bindings, Field, Fields, Metadata};
use super::validation;
use super::{UnlockedState, Vault};

/// Input to `set_secret`. `fields` takes precedence over the legacy
/// `value` slot; when both are absent the record carries no fields.
#[derive(Clone, Debug, Default)]
pub struct NewSecret {
    pub value: Option<String>,
    pub fields: Option<Fields>,
    pub bindings: Option<Bindings>,
    pub notes: Option<String>,
    pub url: Option<String>,
    pub tags: Vec<String>,
    pub folder_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A fully decrypted secret, as returned by `get_secret`.
#[derive(Clone, Debug)]
pub struct SecretEntry {
    pub key: String,
    pub value: Option<String>,
    pub fields: Fields,
    pub bindings: Bindings,
    pub notes: Option<String>,
    pub url: Option<String>,
    pub tags: Vec<String>,
    pub folder_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Metadata-only view, used by the listing operations that must not touch
/// `encrypted_fields` / `encrypted_value`.
#[derive(Clone, Debug)]
pub struct SecretSummary {
    pub key: String,
    pub notes: Option<String>,
    pub url: Option<String>,
    pub tags: Vec<String>,
    pub folder_id: Option<String>,
    pub field_count: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vault {
    pub fn set_secret(&self, key: &str, entry: NewSecret) -> Result<()> {
        validation::validate_key_name(key)?;

        let fields = normalize_fields(&entry)?;
        for (name, field) in &fields {
            validation::validate_field_name(name)?;
            validation::validate_value_size(field.value.as_bytes())?;
        }
        if let Some(bindings) = &entry.bindings {
            for field_name in bindings.values() {
                if !fields.contains_key(field_name) {
                    return Err(Error::KeyInvalid(format!(
                        "binding references unknown field '{field_name}'"
                    )));
                }
            }
        }
        if let Some(notes) = &entry.notes {
            validation::validate_notes(notes)?;
        }
        if let Some(url) = &entry.url {
            validation::validate_url(url)?;
        }
        validation::validate_tags(&entry.tags)?;
        if let Some(expires_at) = entry.expires_at {
            validation::validate_expires_at(expires_at, Utc::now())?;
        }

        self.with_unlocked_mut(|unlocked| set_secret_unlocked(self, unlocked, key, &entry, fields))
    }

    pub fn get_secret(&self, key: &str) -> Result<SecretEntry> {
        validation::validate_key_name(key)?;
        self.with_unlocked(|unlocked| get_secret_unlocked(self, unlocked, key))
    }

    pub fn delete_secret(&self, key: &str) -> Result<()> {
        validation::validate_key_name(key)?;
        self.with_unlocked_mut(|unlocked| {
            let key_hash = crypto::hash_key(&unlocked.dek, key);
            let deleted = secrets::delete_by_hash(unlocked.store.connection(), &key_hash)?;
            if !deleted {
                let mut context = BTreeMap::new();
                context.insert("error_code".to_string(), record::error_codes::NOT_FOUND.to_string());
                self.log_event(
                    &unlocked.audit,
                    Operation::SecretDelete,
                    Some(key.to_string()),
                    Some(key_hash),
                    OutcomeKind::Denied,
                    context,
                );
                return Err(Error::SecretNotFound);
            }
            self.log_event(
                &unlocked.audit,
                Operation::SecretDelete,
                Some(key.to_string()),
                Some(key_hash),
                OutcomeKind::Success,
                BTreeMap::new(),
            );
            Ok(())
        })
    }

    pub fn list_secrets(&self) -> Result<Vec<String>> {
        self.with_unlocked(|unlocked| {
            let rows = secrets::list_all(unlocked.store.connection())?;
            let mut keys = Vec::with_capacity(rows.len());
            for row in rows {
                keys.push(decrypt_key_name(unlocked, &row.encrypted_key)?);
            }
            self.log_event(&unlocked.audit, Operation::SecretList, None, None, OutcomeKind::Success, BTreeMap::new());
            Ok(keys)
        })
    }

    pub fn list_secrets_with_metadata(&self) -> Result<Vec<SecretSummary>> {
        self.with_unlocked(|unlocked| {
            let rows = secrets::list_all(unlocked.store.connection())?;
            let mut out = Vec::with_capacity(rows.len());
            for row in rows {
                out.push(summarize(unlocked, row)?);
            }
            self.log_event(&unlocked.audit, Operation::SecretList, None, None, OutcomeKind::Success, BTreeMap::new());
            Ok(out)
        })
    }

    /// Filters by SQL `LIKE` first, then re-checks the parsed tag array so
    /// that substring matches inside another tag (e.g. `"db"` inside
    /// `"database"`) don't leak into the result.
    pub fn list_secrets_by_tag(&self, tag: &str) -> Result<Vec<SecretSummary>> {
        self.with_unlocked(|unlocked| {
            let rows = secrets::list_by_tag_like(unlocked.store.connection(), tag)?;
            let mut out = Vec::new();
            for row in rows {
                let tags: Vec<String> = serde_json::from_str(&row.tags).unwrap_or_default();
                if !tags.iter().any(|t| t == tag) {
                    continue;
                }
                out.push(summarize(unlocked, row)?);
            }
            self.log_event(&unlocked.audit, Operation::SecretList, None, None, OutcomeKind::Success, BTreeMap::new());
            Ok(out)
        })
    }

    pub fn list_expiring_secrets(&self, within: Duration) -> Result<Vec<SecretSummary>> {
        self.with_unlocked(|unlocked| {
            let deadline = Utc::now() + within;
            let rows = secrets::list_expiring_before(unlocked.store.connection(), deadline)?;
            let mut out = Vec::with_capacity(rows.len());
            for row in rows {
                out.push(summarize(unlocked, row)?);
            }
            self.log_event(&unlocked.audit, Operation::SecretList, None, None, OutcomeKind::Success, BTreeMap::new());
            Ok(out)
        })
    }
}

/// If `fields` is absent but a legacy single `value` is present, synthesize
/// `fields = {"value": {value, sensitive: true}}`.
fn normalize_fields(entry: &NewSecret) -> Result<Fields> {
    match (&entry.fields, &entry.value) {
        (Some(fields), _) => Ok(fields.clone()),
        (None, Some(value)) => {
            validation::validate_value_size(value.as_bytes())?;
            let mut map = Fields::new();
            map.insert("value".to_string(), Field::secret(value.clone()));
            Ok(map)
        }
        (None, None) => Ok(Fields::new()),
    }
}

fn set_secret_unlocked(
    vault: &Vault,
    unlocked: &mut UnlockedState,
    key: &str,
    entry: &NewSecret,
    fields_map: Fields,
) -> Result<()> {
    let key_hash = crypto::hash_key(&unlocked.dek, key);

    let fields_bytes = fields::encode_fields(&fields_map)?;
    let encrypted_fields = Some(crypto::seal(&unlocked.dek, &fields_bytes)?);

    let encrypted_bindings = match &entry.bindings {
        Some(bindings) => Some(crypto::seal(&unlocked.dek, &fields::encode_bindings(bindings)?)?),
        None => None,
    };

    let metadata = Metadata { notes: entry.notes.clone(), url: entry.url.clone() };
    let encrypted_metadata = if metadata.is_empty() {
        None
    } else {
        Some(crypto::seal(&unlocked.dek, &fields::encode_metadata(&metadata)?)?)
    };

    let encrypted_value = match fields_map.get("value") {
        Some(value_field) => Some(crypto::seal(&unlocked.dek, value_field.value.as_bytes())?),
        None => None,
    };

    let encrypted_key = crypto::seal(&unlocked.dek, key.as_bytes())?;

    let payload_len = encrypted_key.len()
        + encrypted_value.as_ref().map(Vec::len).unwrap_or(0)
        + encrypted_fields.as_ref().map(Vec::len).unwrap_or(0)
        + encrypted_bindings.as_ref().map(Vec::len).unwrap_or(0)
        + encrypted_metadata.as_ref().map(Vec::len).unwrap_or(0);

    if let Some((needed, available)) = diskspace::insufficient_for(&vault.paths.root, payload_len as u64) {
        let mut context = BTreeMap::new();
        context.insert("error_code".to_string(), record::error_codes::DISK_FULL.to_string());
        vault.log_event(
            &unlocked.audit,
            Operation::SecretSet,
            Some(key.to_string()),
            Some(key_hash),
            OutcomeKind::Error,
            context,
        );
        return Err(Error::InsufficientDisk { needed, available });
    }
    if diskspace::is_nearly_full(&vault.paths.root) {
        tracing::warn!(path = %vault.paths.root.display(), "vault filesystem is nearly full");
    }

    let now = Utc::now();
    let row = SecretRow {
        id: String::new(),
        key_hash: key_hash.clone(),
        encrypted_key,
        encrypted_value,
        encrypted_fields,
        encrypted_bindings,
        encrypted_metadata,
        schema: "v1".to_string(),
        field_count: fields_map.len() as i64,
        folder_id: entry.folder_id.clone(),
        tags: serde_json::to_string(&entry.tags)?,
        expires_at: entry.expires_at,
        created_at: now,
        updated_at: now,
    };

    match secrets::upsert(unlocked.store.connection(), &row) {
        Ok(_) => {
            vault.log_event(
                &unlocked.audit,
                Operation::SecretSet,
                Some(key.to_string()),
                Some(key_hash),
                OutcomeKind::Success,
                BTreeMap::new(),
            );
            Ok(())
        }
        Err(e) => {
            let mut context = BTreeMap::new();
            context.insert("error_code".to_string(), record::error_codes::INVALID_KEY.to_string());
            vault.log_event(
                &unlocked.audit,
                Operation::SecretSet,
                Some(key.to_string()),
                Some(key_hash),
                OutcomeKind::Error,
                context,
            );
            Err(e)
        }
    }
}

fn get_secret_unlocked(vault: &Vault, unlocked: &UnlockedState, key: &str) -> Result<SecretEntry> {
    let key_hash = crypto::hash_key(&unlocked.dek, key);
    let row = secrets::get_by_hash(unlocked.store.connection(), &key_hash)?;
    let row = match row {
        Some(row) => row,
        None => {
            let mut context = BTreeMap::new();
            context.insert("error_code".to_string(), record::error_codes::NOT_FOUND.to_string());
            vault.log_event(
                &unlocked.audit,
                Operation::SecretGet,
                Some(key.to_string()),
                Some(key_hash),
                OutcomeKind::Denied,
                context,
            );
            return Err(Error::SecretNotFound);
        }
    };

    let open_or_log = |blob: &[u8]| -> Result<Vec<u8>> {
        crypto::open(&unlocked.dek, blob).map_err(|e| {
            let mut context = BTreeMap::new();
            context.insert("error_code".to_string(), record::error_codes::DECRYPT_FAILED.to_string());
            vault.log_event(
                &unlocked.audit,
                Operation::SecretGet,
                Some(key.to_string()),
                Some(key_hash.clone()),
                OutcomeKind::Error,
                context,
            );
            e
        })
    };

    let decoded_fields = if let Some(blob) = &row.encrypted_fields {
        fields::decode_fields(&open_or_log(blob)?)?
    } else if let Some(blob) = &row.encrypted_value {
        let plain = open_or_log(blob)?;
        let value = String::from_utf8(plain).map_err(|_| Error::DatabaseCorrupted("value not utf8".to_string()))?;
        let mut map = Fields::new();
        map.insert("value".to_string(), Field::secret(value));
        map
    } else {
        Fields::new()
    };

    let value = decoded_fields.get("value").map(|f| f.value.clone());

    let bindings = match &row.encrypted_bindings {
        Some(blob) => fields::decode_bindings(&open_or_log(blob)?)?,
        None => Bindings::new(),
    };

    let metadata = match &row.encrypted_metadata {
        Some(blob) => fields::decode_metadata(&open_or_log(blob)?)?,
        None => Metadata::default(),
    };

    let tags: Vec<String> = serde_json::from_str(&row.tags).unwrap_or_default();

    vault.log_event(
        &unlocked.audit,
        Operation::SecretGet,
        Some(key.to_string()),
        Some(key_hash),
        OutcomeKind::Success,
        BTreeMap::new(),
    );

    Ok(SecretEntry {
        key: key.to_string(),
        value,
        fields: decoded_fields,
        bindings,
        notes: metadata.notes,
        url: metadata.url,
        tags,
        folder_id: row.folder_id,
        expires_at: row.expires_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn decrypt_key_name(unlocked: &UnlockedState, encrypted_key: &[u8]) -> Result<String> {
    let plain = crypto::open(&unlocked.dek, encrypted_key)?;
    String::from_utf8(plain).map_err(|_| Error::DatabaseCorrupted("key not utf8".to_string()))
}

fn summarize(unlocked: &UnlockedState, row: SecretRow) -> Result<SecretSummary> {
    let key = decrypt_key_name(unlocked, &row.encrypted_key)?;
    let metadata = match &row.encrypted_metadata {
        Some(blob) => fields::decode_metadata(&crypto::open(&unlocked.dek, blob)?)?,
        None => Metadata::default(),
    };
    let tags: Vec<String> = serde_json::from_str(&row.tags).unwrap_or_default();
    Ok(SecretSummary {
        key,
        notes: metadata.notes,
        url: metadata.url,
        tags,
        folder_id: row.folder_id,
        field_count: row.field_count,
        expires_at: row.expires_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
