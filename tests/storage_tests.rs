use chrono::Utc;
use file_router::placement::StorageClass;
use file_router::router::FileDescriptor;
use file_router::storage::models::FileRecord;
use file_router::storage::{Database, ListFilter};

fn test_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("data")).unwrap();
    (dir, db)
}

fn sample_record(id: &str, file_name: &str) -> FileRecord {
    let now = Utc::now();
    FileRecord {
        id: id.to_string(),
        descriptor: FileDescriptor {
            file_name: file_name.to_string(),
            original_name: "photo.png".to_string(),
            storage_class: StorageClass::ObjectStore,
            locator: file_name.to_string(),
            mime_type: "image/png".to_string(),
            byte_size: 1024,
            is_public: false,
        },
        uploaded_by: Some("admissions".to_string()),
        category: None,
        active: true,
        created_at: now,
        updated_at: now,
    }
}

fn sample_record_with_category(id: &str, file_name: &str, category: &str) -> FileRecord {
    let mut record = sample_record(id, file_name);
    record.category = Some(category.to_string());
    record
}

fn inline_record(id: &str, file_name: &str) -> FileRecord {
    let mut record = sample_record(id, file_name);
    record.descriptor.storage_class = StorageClass::InlineDb;
    record.descriptor.locator = "data:image/png;base64,aGVsbG8=".to_string();
    record
}

#[test]
fn test_put_and_get_file() {
    let (_dir, db) = test_db();
    let record = sample_record("file-1", "1700000000000-deadbeef.png");

    db.put_file(&record).unwrap();

    let retrieved = db.get_file("file-1").unwrap().expect("file should exist");
    assert_eq!(retrieved.id, "file-1");
    assert_eq!(retrieved.descriptor.file_name, "1700000000000-deadbeef.png");
    assert_eq!(retrieved.descriptor.original_name, "photo.png");
    assert_eq!(retrieved.descriptor.storage_class, StorageClass::ObjectStore);
    assert_eq!(retrieved.descriptor.mime_type, "image/png");
    assert_eq!(retrieved.descriptor.byte_size, 1024);
    assert!(!retrieved.descriptor.is_public);
    assert!(retrieved.active);
    assert_eq!(retrieved.uploaded_by, Some("admissions".to_string()));
    assert_eq!(retrieved.category, None);
}

#[test]
fn test_get_file_by_name() {
    let (_dir, db) = test_db();
    let record = sample_record("file-2", "1700000000001-cafef00d.pdf");
    db.put_file(&record).unwrap();

    let retrieved = db
        .get_file_by_name("1700000000001-cafef00d.pdf")
        .unwrap()
        .expect("file should exist");
    assert_eq!(retrieved.id, "file-2");
}

#[test]
fn test_get_file_not_found() {
    let (_dir, db) = test_db();
    assert!(db.get_file("nonexistent").unwrap().is_none());
}

#[test]
fn test_get_file_by_name_not_found() {
    let (_dir, db) = test_db();
    assert!(db.get_file_by_name("no-such-name").unwrap().is_none());
}

#[test]
fn test_deactivate_file_is_soft() {
    let (_dir, db) = test_db();
    let record = sample_record("file-3", "to-delete.png");
    db.put_file(&record).unwrap();

    assert!(db.deactivate_file("file-3").unwrap());

    // The record survives; only the active flag flips
    let retrieved = db.get_file("file-3").unwrap().expect("record is retained");
    assert!(!retrieved.active);
    assert!(retrieved.updated_at >= record.updated_at);

    // Descriptor fields are untouched by deactivation
    assert_eq!(retrieved.descriptor.locator, record.descriptor.locator);
    assert_eq!(
        retrieved.descriptor.storage_class,
        record.descriptor.storage_class
    );
}

#[test]
fn test_deactivate_file_twice() {
    let (_dir, db) = test_db();
    let record = sample_record("file-4", "twice.png");
    db.put_file(&record).unwrap();

    assert!(db.deactivate_file("file-4").unwrap());
    // Second deactivation reports nothing changed
    assert!(!db.deactivate_file("file-4").unwrap());
}

#[test]
fn test_deactivate_file_not_found() {
    let (_dir, db) = test_db();
    assert!(!db.deactivate_file("nonexistent").unwrap());
}

#[test]
fn test_list_files_excludes_inactive_by_default() {
    let (_dir, db) = test_db();
    db.put_file(&sample_record("a", "a.png")).unwrap();
    db.put_file(&sample_record("b", "b.png")).unwrap();
    db.deactivate_file("b").unwrap();

    let visible = db.list_files(&ListFilter::default()).unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, "a");

    let all = db
        .list_files(&ListFilter {
            include_inactive: true,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(all.len(), 2);
}

#[test]
fn test_list_files_by_storage_class() {
    let (_dir, db) = test_db();
    db.put_file(&sample_record("obj", "obj.png")).unwrap();
    db.put_file(&inline_record("inl", "inl.png")).unwrap();

    let inline_only = db
        .list_files(&ListFilter {
            storage_class: Some(StorageClass::InlineDb),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(inline_only.len(), 1);
    assert_eq!(inline_only[0].id, "inl");

    let object_only = db
        .list_files(&ListFilter {
            storage_class: Some(StorageClass::ObjectStore),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(object_only.len(), 1);
    assert_eq!(object_only[0].id, "obj");
}

#[test]
fn test_category_index() {
    let (_dir, db) = test_db();
    db.put_file(&sample_record_with_category("t1", "t1.pdf", "transcripts"))
        .unwrap();
    db.put_file(&sample_record_with_category("t2", "t2.pdf", "transcripts"))
        .unwrap();
    db.put_file(&sample_record_with_category("p1", "p1.png", "photos"))
        .unwrap();

    let transcripts = db.get_files_by_category("transcripts").unwrap();
    assert_eq!(transcripts.len(), 2);

    let filtered = db
        .list_files(&ListFilter {
            category: Some("photos"),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].id, "p1");

    assert!(db.get_files_by_category("unknown").unwrap().is_empty());
}

#[test]
fn test_file_name_exists() {
    let (_dir, db) = test_db();
    assert!(!db.file_name_exists("some-name.png").unwrap());

    db.put_file(&sample_record("x", "some-name.png")).unwrap();
    assert!(db.file_name_exists("some-name.png").unwrap());
}

#[test]
fn test_put_file_rejects_name_claimed_by_other_record() {
    let (_dir, db) = test_db();
    db.put_file(&sample_record("first", "collide.png")).unwrap();

    // A different record may not silently take over the name index entry
    let result = db.put_file(&sample_record("second", "collide.png"));
    assert!(matches!(
        result,
        Err(file_router::storage::DatabaseError::DuplicateFileName(_))
    ));

    // The original record and its index are untouched
    let retrieved = db.get_file_by_name("collide.png").unwrap().unwrap();
    assert_eq!(retrieved.id, "first");
    assert!(db.get_file("second").unwrap().is_none());
}

#[test]
fn test_put_file_same_record_is_reinsertable() {
    let (_dir, db) = test_db();
    let mut record = sample_record("rewrite", "rewrite.png");
    db.put_file(&record).unwrap();

    // Re-putting the same id under the same name is not a collision
    record.uploaded_by = Some("registrar".to_string());
    db.put_file(&record).unwrap();

    let retrieved = db.get_file("rewrite").unwrap().unwrap();
    assert_eq!(retrieved.uploaded_by, Some("registrar".to_string()));
}

#[test]
fn test_inline_locator_round_trips_through_storage() {
    let (_dir, db) = test_db();
    let record = inline_record("inline-1", "inline-1.png");
    db.put_file(&record).unwrap();

    let retrieved = db.get_file("inline-1").unwrap().unwrap();
    assert_eq!(retrieved.descriptor.locator, record.descriptor.locator);
}

#[test]
fn test_purge_all() {
    let (_dir, db) = test_db();
    db.put_file(&sample_record("a", "a.png")).unwrap();
    db.put_file(&sample_record_with_category("b", "b.png", "photos"))
        .unwrap();

    let stats = db.purge_all().unwrap();
    assert_eq!(stats.files, 2);

    assert!(db.get_all_files().unwrap().is_empty());
    assert!(!db.file_name_exists("a.png").unwrap());
    assert!(db.get_files_by_category("photos").unwrap().is_empty());
}
