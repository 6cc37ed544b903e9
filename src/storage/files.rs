use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::FileRecord;
use super::tables::*;
use crate::placement::StorageClass;

/// Filters for listing file records.
#[derive(Debug, Default)]
pub struct ListFilter<'a> {
    pub storage_class: Option<StorageClass>,
    pub category: Option<&'a str>,
    /// Soft-deleted records are excluded unless set.
    pub include_inactive: bool,
}

impl Database {
    // ========================================================================
    // File record operations
    // ========================================================================

    /// Store a file record and update the name and category indexes
    pub fn put_file(&self, file: &FileRecord) -> Result<(), DatabaseError> {
        debug_assert!(!file.id.is_empty(), "file id must not be empty");
        debug_assert!(
            !file.descriptor.file_name.is_empty(),
            "generated file name must not be empty"
        );

        let write_txn = self.begin_write()?;
        {
            let mut name_table = write_txn.open_table(FILE_NAMES)?;

            // Generated names are timestamp+random, so a clash is
            // astronomically unlikely -- but the index must never be
            // silently repointed at a different record.
            let claimed_by_other = name_table
                .get(file.descriptor.file_name.as_str())?
                .map(|v| v.value().to_string())
                .filter(|existing_id| existing_id != &file.id);
            if claimed_by_other.is_some() {
                return Err(DatabaseError::DuplicateFileName(
                    file.descriptor.file_name.clone(),
                ));
            }

            let mut table = write_txn.open_table(FILES)?;
            let data = rmp_serde::to_vec_named(file)?;
            table.insert(file.id.as_str(), data.as_slice())?;

            name_table.insert(file.descriptor.file_name.as_str(), file.id.as_str())?;

            // Maintain category index
            if let Some(ref category) = file.category {
                let mut category_table = write_txn.open_table(CATEGORY_FILES)?;
                let mut file_ids: Vec<String> = category_table
                    .get(category.as_str())?
                    .map(|v| rmp_serde::from_slice(v.value()).unwrap_or_default())
                    .unwrap_or_default();

                if !file_ids.contains(&file.id) {
                    file_ids.push(file.id.clone());
                    let index_data = rmp_serde::to_vec_named(&file_ids)?;
                    category_table.insert(category.as_str(), index_data.as_slice())?;
                }
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get a file record by its UUID
    pub fn get_file(&self, id: &str) -> Result<Option<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILES)?;

        match table.get(id)? {
            Some(data) => {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(file))
            }
            None => Ok(None),
        }
    }

    /// Get a file record by its generated name (resolves name -> uuid -> record)
    pub fn get_file_by_name(&self, file_name: &str) -> Result<Option<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let name_table = read_txn.open_table(FILE_NAMES)?;

        let id = match name_table.get(file_name)? {
            Some(data) => data.value().to_string(),
            None => return Ok(None),
        };

        let files_table = read_txn.open_table(FILES)?;
        match files_table.get(id.as_str())? {
            Some(data) => {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(file))
            }
            None => Ok(None),
        }
    }

    /// Get all file records for a category
    pub fn get_files_by_category(&self, category: &str) -> Result<Vec<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let category_table = read_txn.open_table(CATEGORY_FILES)?;
        let files_table = read_txn.open_table(FILES)?;

        let file_ids: Vec<String> = match category_table.get(category)? {
            Some(data) => rmp_serde::from_slice(data.value())?,
            None => return Ok(Vec::new()),
        };

        let mut files = Vec::new();
        for file_id in file_ids {
            if let Some(data) = files_table.get(file_id.as_str())? {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                files.push(file);
            }
        }

        Ok(files)
    }

    /// Soft-delete a file record: flip `active` off, keep the record and its
    /// indexes. Returns false when the record is missing or already inactive.
    pub fn deactivate_file(&self, id: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;

        let existing = {
            let table = write_txn.open_table(FILES)?;
            let result = match table.get(id)? {
                Some(data) => {
                    let file: FileRecord = rmp_serde::from_slice(data.value())?;
                    Some(file)
                }
                None => None,
            };
            result
        };

        let deactivated = match existing {
            Some(mut file) if file.active => {
                file.active = false;
                file.updated_at = chrono::Utc::now();

                let serialized = rmp_serde::to_vec_named(&file)?;
                let mut table = write_txn.open_table(FILES)?;
                table.insert(id, serialized.as_slice())?;
                true
            }
            _ => false,
        };

        write_txn.commit()?;
        Ok(deactivated)
    }

    /// Get all file records (including inactive)
    pub fn get_all_files(&self) -> Result<Vec<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILES)?;

        let mut files = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            let file: FileRecord = rmp_serde::from_slice(value.value())?;
            files.push(file);
        }

        Ok(files)
    }

    /// List file records with optional storage-class and category filters
    pub fn list_files(&self, filter: &ListFilter<'_>) -> Result<Vec<FileRecord>, DatabaseError> {
        // Use the category index when a category is provided
        let all = match filter.category {
            Some(category) => self.get_files_by_category(category)?,
            None => self.get_all_files()?,
        };

        Ok(all
            .into_iter()
            .filter(|f| filter.include_inactive || f.active)
            .filter(|f| {
                filter
                    .storage_class
                    .map(|class| f.descriptor.storage_class == class)
                    .unwrap_or(true)
            })
            .collect())
    }

    /// Check if a generated name is already in use
    pub fn file_name_exists(&self, file_name: &str) -> Result<bool, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILE_NAMES)?;
        Ok(table.get(file_name)?.is_some())
    }
}
