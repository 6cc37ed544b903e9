use redb::TableDefinition;

/// File records: uuid -> FileRecord (msgpack)
pub const FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("files");

/// Generated-name index: file_name -> uuid (for content-route lookups)
pub const FILE_NAMES: TableDefinition<&str, &str> = TableDefinition::new("file_names");

/// Category index: category -> msgpack Vec of file UUIDs
pub const CATEGORY_FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("category_files");
