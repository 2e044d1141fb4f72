//! Folder hierarchy operations (spec §4.3's folder sub-operations):
//! create/rename/move/delete, path resolution, and cycle prevention.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::storage::folders::{self, FolderRow};
use crate::storage::secrets;

use super::validation;
use super::Vault;

#[derive(Clone, Debug)]
pub struct FolderInfo {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FolderRow> for FolderInfo {
    fn from(row: FolderRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            parent_id: row.parent_id,
            icon: row.icon,
            color: row.color,
            sort_order: row.sort_order,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FolderStats {
    pub folder: FolderInfo,
    pub child_count: i64,
    pub secret_count: i64,
}

impl Vault {
    pub fn create_folder(
        &self,
        name: &str,
        parent_id: Option<&str>,
        icon: Option<&str>,
        color: Option<&str>,
    ) -> Result<FolderInfo> {
        validation::validate_folder_name(name)?;
        self.with_unlocked_mut(|unlocked| {
            let conn = unlocked.store.connection();
            if let Some(parent) = parent_id {
                if folders::get_by_id(conn, parent)?.is_none() {
                    return Err(Error::FolderNotFound);
                }
            }
            let now = Utc::now();
            let row = FolderRow {
                id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                parent_id: parent_id.map(str::to_string),
                icon: icon.map(str::to_string),
                color: color.map(str::to_string),
                sort_order: 0,
                created_at: now,
                updated_at: now,
            };
            folders::insert(conn, &row)?;
            Ok(FolderInfo::from(row))
        })
    }

    pub fn get_folder(&self, id: &str) -> Result<FolderInfo> {
        self.with_unlocked(|unlocked| {
            folders::get_by_id(unlocked.store.connection(), id)?
                .map(FolderInfo::from)
                .ok_or(Error::FolderNotFound)
        })
    }

    /// Resolves a `/`-separated path by walking from the root, erroring if
    /// any segment along the way doesn't exist.
    pub fn get_folder_by_path(&self, path: &str) -> Result<FolderInfo> {
        self.with_unlocked(|unlocked| {
            let conn = unlocked.store.connection();
            let mut parent: Option<String> = None;
            let mut current: Option<FolderRow> = None;
            for segment in path.split('/').filter(|s| !s.is_empty()) {
                let found = folders::get_by_name_and_parent(conn, segment, parent.as_deref())?
                    .ok_or(Error::FolderNotFound)?;
                parent = Some(found.id.clone());
                current = Some(found);
            }
            current.map(FolderInfo::from).ok_or(Error::FolderNotFound)
        })
    }

    pub fn list_folders(&self, parent_id: Option<&str>) -> Result<Vec<FolderInfo>> {
        self.with_unlocked(|unlocked| {
            Ok(folders::list_children(unlocked.store.connection(), parent_id)?
                .into_iter()
                .map(FolderInfo::from)
                .collect())
        })
    }

    pub fn list_folders_with_stats(&self, parent_id: Option<&str>) -> Result<Vec<FolderStats>> {
        self.with_unlocked(|unlocked| {
            let conn = unlocked.store.connection();
            let rows = folders::list_children(conn, parent_id)?;
            let mut out = Vec::with_capacity(rows.len());
            for row in rows {
                let child_count = folders::count_children(conn, &row.id)?;
                let secret_count = secrets::count_in_folder(conn, &row.id)?;
                out.push(FolderStats { folder: FolderInfo::from(row), child_count, secret_count });
            }
            Ok(out)
        })
    }

    /// Renames and/or moves a folder. `new_parent: Some(None)` moves it to
    /// the root; `None` leaves the parent unchanged. Rejects any move whose
    /// target is within the folder's own subtree.
    pub fn update_folder(
        &self,
        id: &str,
        name: Option<&str>,
        new_parent: Option<Option<&str>>,
        icon: Option<&str>,
        color: Option<&str>,
    ) -> Result<FolderInfo> {
        if let Some(name) = name {
            validation::validate_folder_name(name)?;
        }
        self.with_unlocked_mut(|unlocked| {
            let conn = unlocked.store.connection();
            let mut row = folders::get_by_id(conn, id)?.ok_or(Error::FolderNotFound)?;

            if let Some(target) = new_parent {
                if let Some(target_id) = target {
                    if would_create_cycle(conn, target_id, id)? {
                        return Err(Error::FolderCircular);
                    }
                }
                row.parent_id = target.map(str::to_string);
            }
            if let Some(name) = name {
                row.name = name.to_string();
            }
            if let Some(icon) = icon {
                row.icon = Some(icon.to_string());
            }
            if let Some(color) = color {
                row.color = Some(color.to_string());
            }
            row.updated_at = Utc::now();

            folders::update(conn, &row)?;
            Ok(FolderInfo::from(row))
        })
    }

    /// Deletes a folder. Without `recursive`, refuses if it has children
    /// or contained secrets. With `recursive`, re-parents every contained
    /// secret to unfiled (`folder_id = NULL`) and deletes the subtree
    /// depth-first.
    pub fn delete_folder(&self, id: &str, recursive: bool) -> Result<()> {
        self.with_unlocked_mut(|unlocked| {
            let conn = unlocked.store.connection();
            folders::get_by_id(conn, id)?.ok_or(Error::FolderNotFound)?;

            if !recursive {
                let child_count = folders::count_children(conn, id)?;
                let secret_count = secrets::count_in_folder(conn, id)?;
                if child_count > 0 {
                    return Err(Error::FolderHasChildren);
                }
                if secret_count > 0 {
                    return Err(Error::FolderHasSecrets);
                }
                folders::delete(conn, id)?;
                return Ok(());
            }

            delete_subtree(conn, id)
        })
    }
}

fn delete_subtree(conn: &rusqlite::Connection, id: &str) -> Result<()> {
    for child in folders::list_children(conn, Some(id))? {
        delete_subtree(conn, &child.id)?;
    }
    secrets::clear_folder_id(conn, id)?;
    folders::delete(conn, id)?;
    Ok(())
}

/// Walks upward from `candidate` through its parent chain; `true` if it
/// ever reaches `moved_id`, meaning `candidate` lies in the subtree rooted
/// at the folder being moved.
fn would_create_cycle(conn: &rusqlite::Connection, candidate: &str, moved_id: &str) -> Result<bool> {
    let mut current = candidate.to_string();
    loop {
        if current == moved_id {
            return Ok(true);
        }
        match folders::get_by_id(conn, &current)? {
            Some(row) => match row.parent_id {
                Some(parent) => current = parent,
                None => return Ok(false),
            },
            None => return Ok(false),
        }
    }
}
