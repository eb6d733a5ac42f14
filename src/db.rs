use crate::error::{StoreError, StoreResult};
use crate::fingerprint::Fingerprint;
use crate::i18n::Language;
use crate::model::{
    ActorId, FuzzyStatus, RecordFilter, RecordId, TranslationKey, TranslationRecord,
};
use crate::store::TranslationStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use std::str::FromStr;
use tracing::{debug, info};

const SELECT_COLUMNS: &str = "SELECT id, namespace, type_name, object_id, field, language, \
     source_text, source_fingerprint, translated_text, is_fuzzy, context, \
     created_at, updated_at, last_editor FROM field_translations";

#[derive(Debug, sqlx::FromRow)]
struct RecordRow {
    id: i64,
    namespace: String,
    type_name: String,
    object_id: i64,
    field: String,
    language: String,
    source_text: String,
    source_fingerprint: String,
    translated_text: Option<String>,
    is_fuzzy: bool,
    context: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_editor: Option<i64>,
}

impl TryFrom<RecordRow> for TranslationRecord {
    type Error = StoreError;

    fn try_from(row: RecordRow) -> StoreResult<Self> {
        let invalid = |e: crate::error::TranslationError| {
            StoreError::InvalidRow(format!("record {}: {}", row.id, e))
        };
        let language = Language::parse(&row.language).map_err(invalid)?;
        let key = TranslationKey::new(
            row.namespace.clone(),
            row.type_name.clone(),
            row.object_id,
            row.field.clone(),
            language,
        )
        .map_err(invalid)?;

        Ok(TranslationRecord {
            id: Some(row.id),
            key,
            source_text: row.source_text,
            source_fingerprint: Fingerprint::from_hex(row.source_fingerprint),
            translated_text: row.translated_text,
            is_fuzzy: row.is_fuzzy,
            context: row.context,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_editor: row.last_editor.map(ActorId),
        })
    }
}

/// Per-language record counts, as reported by [`Database::stats`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct LanguageStats {
    pub language: String,
    pub fuzzy: i64,
    pub completed: i64,
}

/// SQLite-backed translation record store.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to the database at `database_url` and create tables.
    ///
    /// The database file is created if it does not exist.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.create_schema().await?;
        info!("Connected to translation database at {}", database_url);
        Ok(db)
    }

    /// Private in-memory database (single connection, so every query sees the same data).
    pub async fn in_memory() -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.create_schema().await?;
        Ok(db)
    }

    async fn create_schema(&self) -> StoreResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS field_translations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                namespace TEXT NOT NULL,
                type_name TEXT NOT NULL,
                object_id INTEGER NOT NULL,
                field TEXT NOT NULL,
                language TEXT NOT NULL,
                source_text TEXT NOT NULL,
                source_fingerprint TEXT NOT NULL,
                translated_text TEXT,
                is_fuzzy INTEGER NOT NULL DEFAULT 1,
                context TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                last_editor INTEGER,
                UNIQUE (namespace, type_name, object_id, field, language)
            )",
        )
        .execute(&self.pool)
        .await?;

        // Instances sharing identical source text
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_field_translations_fingerprint
             ON field_translations (source_fingerprint)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_field_translations_filter
             ON field_translations (type_name, object_id, language, field, is_fuzzy)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_field_translations_language
             ON field_translations (language, is_fuzzy)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert or update one record on the given connection.
    async fn write(
        conn: &mut SqliteConnection,
        mut record: TranslationRecord,
    ) -> StoreResult<TranslationRecord> {
        let key = &record.key;
        match record.id {
            None => {
                let result = sqlx::query(
                    "INSERT INTO field_translations (namespace, type_name, object_id, field, language,
                        source_text, source_fingerprint, translated_text, is_fuzzy, context,
                        created_at, updated_at, last_editor)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                )
                .bind(&key.namespace)
                .bind(&key.type_name)
                .bind(key.object_id)
                .bind(&key.field)
                .bind(key.language.code())
                .bind(&record.source_text)
                .bind(record.source_fingerprint.as_str())
                .bind(&record.translated_text)
                .bind(record.is_fuzzy)
                .bind(&record.context)
                .bind(record.created_at)
                .bind(record.updated_at)
                .bind(record.last_editor.map(|actor| actor.0))
                .execute(&mut *conn)
                .await
                .map_err(|e| map_write_error(e, key))?;

                record.id = Some(result.last_insert_rowid());
                debug!("Inserted translation {} as id {}", key, result.last_insert_rowid());
            }
            Some(id) => {
                let result = sqlx::query(
                    "UPDATE field_translations SET namespace = ?1, type_name = ?2, object_id = ?3,
                        field = ?4, language = ?5, source_text = ?6, source_fingerprint = ?7,
                        translated_text = ?8, is_fuzzy = ?9, context = ?10, created_at = ?11,
                        updated_at = ?12, last_editor = ?13
                     WHERE id = ?14",
                )
                .bind(&key.namespace)
                .bind(&key.type_name)
                .bind(key.object_id)
                .bind(&key.field)
                .bind(key.language.code())
                .bind(&record.source_text)
                .bind(record.source_fingerprint.as_str())
                .bind(&record.translated_text)
                .bind(record.is_fuzzy)
                .bind(&record.context)
                .bind(record.created_at)
                .bind(record.updated_at)
                .bind(record.last_editor.map(|actor| actor.0))
                .bind(id)
                .execute(&mut *conn)
                .await
                .map_err(|e| map_write_error(e, key))?;

                if result.rows_affected() == 0 {
                    return Err(StoreError::MissingRecord(id));
                }
            }
        }

        Ok(record)
    }

    /// Append the WHERE conditions of `filter` (paging included).
    fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &RecordFilter) {
        if let Some(language) = &filter.language {
            qb.push(" AND language = ")
                .push_bind(language.code().to_string());
        }
        match filter.status {
            FuzzyStatus::All => {}
            FuzzyStatus::Fuzzy => {
                qb.push(" AND is_fuzzy = 1");
            }
            FuzzyStatus::Completed => {
                qb.push(" AND is_fuzzy = 0");
            }
        }
        if let Some(search) = &filter.search {
            qb.push(" AND instr(LOWER(source_text), ")
                .push_bind(search.to_lowercase())
                .push(") > 0");
        }
        if let Some(namespace) = &filter.namespace {
            qb.push(" AND namespace = ").push_bind(namespace.clone());
        }
        if let Some(type_name) = &filter.type_name {
            qb.push(" AND type_name = ").push_bind(type_name.clone());
        }
        if let Some(object_id) = filter.object_id {
            qb.push(" AND object_id = ").push_bind(object_id);
        }
        if let Some(field) = &filter.field {
            qb.push(" AND field = ").push_bind(field.clone());
        }
        if let Some(fingerprint) = &filter.fingerprint {
            qb.push(" AND source_fingerprint = ")
                .push_bind(fingerprint.as_str().to_string());
        }
        if let Some(after_id) = filter.after_id {
            qb.push(" AND id > ").push_bind(after_id);
        }
    }

    /// Record counts grouped by language and review status.
    pub async fn stats(&self) -> StoreResult<Vec<LanguageStats>> {
        let rows: Vec<(String, bool, i64)> = sqlx::query_as(
            "SELECT language, is_fuzzy, COUNT(*) FROM field_translations
             GROUP BY language, is_fuzzy
             ORDER BY language",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut stats: Vec<LanguageStats> = Vec::new();
        for (language, is_fuzzy, count) in rows {
            let position = match stats.iter().position(|s| s.language == language) {
                Some(position) => position,
                None => {
                    stats.push(LanguageStats {
                        language,
                        fuzzy: 0,
                        completed: 0,
                    });
                    stats.len() - 1
                }
            };
            if is_fuzzy {
                stats[position].fuzzy += count;
            } else {
                stats[position].completed += count;
            }
        }

        Ok(stats)
    }
}

fn map_write_error(error: sqlx::Error, key: &TranslationKey) -> StoreError {
    match &error {
        sqlx::Error::Database(db_error) if db_error.is_unique_violation() => {
            StoreError::DuplicateKey(key.to_string())
        }
        _ => StoreError::Database(error),
    }
}

#[async_trait]
impl TranslationStore for Database {
    async fn get(&self, id: RecordId) -> StoreResult<Option<TranslationRecord>> {
        let row: Option<RecordRow> = sqlx::query_as(&format!("{} WHERE id = ?1", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TranslationRecord::try_from).transpose()
    }

    async fn find(&self, key: &TranslationKey) -> StoreResult<Option<TranslationRecord>> {
        let row: Option<RecordRow> = sqlx::query_as(&format!(
            "{} WHERE namespace = ?1 AND type_name = ?2 AND object_id = ?3
               AND field = ?4 AND language = ?5",
            SELECT_COLUMNS
        ))
        .bind(&key.namespace)
        .bind(&key.type_name)
        .bind(key.object_id)
        .bind(&key.field)
        .bind(key.language.code())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TranslationRecord::try_from).transpose()
    }

    async fn save(&self, record: TranslationRecord) -> StoreResult<TranslationRecord> {
        let mut conn = self.pool.acquire().await?;
        Self::write(&mut conn, record).await
    }

    async fn save_all(
        &self,
        records: Vec<TranslationRecord>,
    ) -> StoreResult<Vec<TranslationRecord>> {
        let mut tx = self.pool.begin().await?;
        let mut saved = Vec::with_capacity(records.len());

        // Dropping the transaction on error rolls back every write
        for record in records {
            saved.push(Self::write(&mut tx, record).await?);
        }

        tx.commit().await?;
        debug!("Committed {} translation records", saved.len());
        Ok(saved)
    }

    async fn delete(&self, id: RecordId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM field_translations WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn query(&self, filter: &RecordFilter) -> StoreResult<Vec<TranslationRecord>> {
        let mut qb = QueryBuilder::<Sqlite>::new(SELECT_COLUMNS);
        qb.push(" WHERE 1 = 1");
        Self::push_filter(&mut qb, filter);
        qb.push(" ORDER BY id ASC");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows: Vec<RecordRow> = qb.build_query_as::<RecordRow>().fetch_all(&self.pool).await?;
        rows.into_iter().map(TranslationRecord::try_from).collect()
    }

    async fn count(&self, filter: &RecordFilter) -> StoreResult<usize> {
        let unpaged = RecordFilter {
            after_id: None,
            limit: None,
            ..filter.clone()
        };

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM field_translations WHERE 1 = 1");
        Self::push_filter(&mut qb, &unpaged);

        let count: i64 = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // ==================== Helper Functions ====================

    fn record(object_id: i64, field: &str, lang: &str, source: &str) -> TranslationRecord {
        let key = TranslationKey::new(
            "blog.models",
            "Article",
            object_id,
            field,
            Language::parse(lang).unwrap(),
        )
        .unwrap();
        TranslationRecord::new(key, source)
    }

    async fn create_test_db() -> Database {
        Database::in_memory()
            .await
            .expect("Failed to create in-memory database")
    }

    // ==================== Database Initialization Tests ====================

    #[tokio::test]
    async fn test_database_creation() {
        let db = create_test_db().await;
        let count = db.count(&RecordFilter::all()).await.expect("Should count");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_database_reopening() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("translations.db");
        let url = format!("sqlite://{}", db_path.display());

        {
            let db = Database::connect(&url).await.expect("Failed to create database");
            db.save(record(1, "title", "fr", "Launch")).await.expect("Should save");
        }

        {
            let db = Database::connect(&url).await.expect("Failed to reopen database");
            let count = db.count(&RecordFilter::all()).await.expect("Should count");
            assert_eq!(count, 1, "Record should persist");
        }
    }

    // ==================== save / get Tests ====================

    #[tokio::test]
    async fn test_insert_and_get_roundtrip() {
        let db = create_test_db().await;

        let mut new_record = record(42, "title", "fr", "Launch \"Day\"");
        new_record.translated_text = Some("Lancement".into());
        new_record.is_fuzzy = false;
        new_record.context = Some("Updated from object".into());
        new_record.last_editor = Some(ActorId(3));

        let saved = db.save(new_record).await.expect("Should insert");
        let id = saved.id.expect("Id assigned");

        let fetched = db.get(id).await.expect("Should get").expect("Should exist");
        assert_eq!(fetched.key, saved.key);
        assert_eq!(fetched.source_text, "Launch \"Day\"");
        assert_eq!(fetched.source_fingerprint, Fingerprint::of("Launch \"Day\""));
        assert_eq!(fetched.translated_text.as_deref(), Some("Lancement"));
        assert!(!fetched.is_fuzzy);
        assert_eq!(fetched.context.as_deref(), Some("Updated from object"));
        assert_eq!(fetched.last_editor, Some(ActorId(3)));
        assert!(fetched.updated_at >= fetched.created_at);
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let db = create_test_db().await;
        assert!(db.get(999).await.expect("Should query").is_none());
    }

    #[tokio::test]
    async fn test_update_existing() {
        let db = create_test_db().await;

        let mut saved = db.save(record(1, "title", "fr", "Launch")).await.unwrap();
        saved.set_source_text("Launch Day");
        saved.translated_text = None;
        db.save(saved.clone()).await.expect("Should update");

        let fetched = db.find(&saved.key).await.unwrap().expect("Should exist");
        assert_eq!(fetched.id, saved.id);
        assert_eq!(fetched.source_text, "Launch Day");
        assert_eq!(fetched.translated_text, None);
        assert_eq!(db.count(&RecordFilter::all()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let db = create_test_db().await;
        let mut ghost = record(1, "title", "fr", "Launch");
        ghost.id = Some(77);
        let result = db.save(ghost).await;
        assert!(matches!(result, Err(StoreError::MissingRecord(77))));
    }

    #[tokio::test]
    async fn test_duplicate_key_rejected() {
        let db = create_test_db().await;
        db.save(record(1, "title", "fr", "Launch")).await.unwrap();

        let result = db.save(record(1, "title", "fr", "Launch")).await;
        assert!(matches!(result, Err(StoreError::DuplicateKey(_))));
    }

    #[tokio::test]
    async fn test_sql_injection_in_text_is_stored_verbatim() {
        let db = create_test_db().await;
        let malicious = "x'); DROP TABLE field_translations; --";
        let saved = db.save(record(1, "title", "fr", malicious)).await.unwrap();

        let fetched = db.get(saved.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(fetched.source_text, malicious);
        assert_eq!(db.count(&RecordFilter::all()).await.unwrap(), 1);
    }

    // ==================== save_all Tests ====================

    #[tokio::test]
    async fn test_save_all_rolls_back_on_failure() {
        let db = create_test_db().await;
        db.save(record(1, "title", "fr", "Launch")).await.unwrap();

        let batch = vec![
            record(2, "title", "fr", "Party"),
            record(3, "title", "fr", "Gala"),
            record(1, "title", "fr", "Launch"), // duplicate key
        ];
        let result = db.save_all(batch).await;
        assert!(result.is_err());
        assert_eq!(
            db.count(&RecordFilter::all()).await.unwrap(),
            1,
            "Failed batch must be rolled back"
        );
    }

    #[tokio::test]
    async fn test_save_all_commits() {
        let db = create_test_db().await;
        let batch = vec![record(2, "title", "fr", "Party"), record(3, "title", "fr", "Gala")];
        let saved = db.save_all(batch).await.expect("Should commit");
        assert!(saved.iter().all(|r| r.id.is_some()));
        assert_eq!(db.count(&RecordFilter::all()).await.unwrap(), 2);
    }

    // ==================== delete Tests ====================

    #[tokio::test]
    async fn test_delete() {
        let db = create_test_db().await;
        let saved = db.save(record(1, "title", "fr", "Launch")).await.unwrap();
        let id = saved.id.unwrap();

        assert!(db.delete(id).await.unwrap());
        assert!(!db.delete(id).await.unwrap(), "Second delete finds nothing");
        assert!(db.get(id).await.unwrap().is_none());
    }

    // ==================== query Tests ====================

    #[tokio::test]
    async fn test_query_filters() {
        let db = create_test_db().await;
        let fr = Language::parse("fr").unwrap();

        let mut done = record(1, "title", "fr", "Launch Day");
        done.translated_text = Some("Lancement".into());
        done.is_fuzzy = false;
        db.save(done).await.unwrap();
        db.save(record(2, "title", "fr", "Summer Party")).await.unwrap();
        db.save(record(1, "title", "en", "Launch Day")).await.unwrap();

        let all_fr = RecordFilter::all().language(&fr);
        assert_eq!(db.query(&all_fr).await.unwrap().len(), 2);

        let fuzzy = all_fr.clone().status(FuzzyStatus::Fuzzy);
        let rows = db.query(&fuzzy).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].source_text, "Summer Party");

        let completed = all_fr.clone().status(FuzzyStatus::Completed);
        assert_eq!(db.query(&completed).await.unwrap().len(), 1);

        let search = RecordFilter::all().search("LAUNCH");
        assert_eq!(db.query(&search).await.unwrap().len(), 2);

        let shared = RecordFilter::all().fingerprint(Fingerprint::of("Launch Day"));
        assert_eq!(db.query(&shared).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_search_treats_wildcards_literally() {
        let db = create_test_db().await;
        db.save(record(1, "title", "fr", "100% off")).await.unwrap();
        db.save(record(2, "title", "fr", "1000 off")).await.unwrap();

        let rows = db.query(&RecordFilter::all().search("0%")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].source_text, "100% off");
    }

    #[tokio::test]
    async fn test_query_paging() {
        let db = create_test_db().await;
        for id in 1..=5 {
            db.save(record(id, "title", "fr", &format!("Title {}", id)))
                .await
                .unwrap();
        }

        let first = db.query(&RecordFilter::all().page(None, 2)).await.unwrap();
        let ids: Vec<_> = first.iter().filter_map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);

        let next = db.query(&RecordFilter::all().page(Some(2), 2)).await.unwrap();
        let ids: Vec<_> = next.iter().filter_map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 4]);

        let count = db.count(&RecordFilter::all().page(Some(2), 2)).await.unwrap();
        assert_eq!(count, 5, "Count ignores paging");
    }

    // ==================== stats Tests ====================

    #[tokio::test]
    async fn test_stats_groups_by_language() {
        let db = create_test_db().await;
        let mut done = record(1, "title", "fr", "Launch");
        done.translated_text = Some("Lancement".into());
        done.is_fuzzy = false;
        db.save(done).await.unwrap();
        db.save(record(2, "title", "fr", "Party")).await.unwrap();
        db.save(record(1, "title", "en", "Launch")).await.unwrap();

        let stats = db.stats().await.unwrap();
        assert_eq!(
            stats,
            vec![
                LanguageStats {
                    language: "en".into(),
                    fuzzy: 1,
                    completed: 0
                },
                LanguageStats {
                    language: "fr".into(),
                    fuzzy: 1,
                    completed: 1
                },
            ]
        );
    }
}
