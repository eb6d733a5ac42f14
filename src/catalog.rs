//! Catalog codec: gettext-style export and import of the translations of one language.
//!
//! Every record becomes one entry:
//!
//! ```text
//! #, fuzzy
//! msgctxt "<id>--<namespace>--<type>--<object id>--<field>"
//! msgid "<source text>"
//! msgstr "<translated text>"
//! ```
//!
//! followed by a blank line. The fuzzy marker is only written for fuzzy
//! records. The context line is the only identity carrier: it holds the
//! record id and the full composite key minus the language, which is a
//! parameter of the import.

use crate::cancel::CancelFlag;
use crate::error::{Result, TranslationError};
use crate::i18n::{Language, LanguageRegistry};
use crate::model::{ActorId, ObjectId, RecordFilter, RecordId, TranslationKey, TranslationRecord};
use crate::orphans::{OrphanCollector, SweepReport};
use crate::store::TranslationStore;
use chrono::Utc;
use regex::Regex;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

/// Media type of a catalog file.
pub const MIME_TYPE: &str = "text/x-gettext-translation";

/// Line preceding the context line of a fuzzy entry.
pub const FUZZY_MARKER: &str = "#, fuzzy";

/// Context annotation of records created by an import.
pub const IMPORT_CONTEXT: &str = "Catalog import";

/// Lines consumed by one parsed entry: context, msgid, msgstr and the separator.
const ENTRY_STRIDE: usize = 4;

static CONTEXT_REGEX: OnceLock<Regex> = OnceLock::new();
static MSGID_REGEX: OnceLock<Regex> = OnceLock::new();
static MSGSTR_REGEX: OnceLock<Regex> = OnceLock::new();

fn context_regex() -> &'static Regex {
    CONTEXT_REGEX.get_or_init(|| {
        Regex::new(
            r#"^msgctxt\s+"(?P<id>\d+)--(?P<namespace>[A-Za-z0-9_.:]+)--(?P<type_name>[A-Za-z0-9_]+)--(?P<object_id>\d+)--(?P<field>[A-Za-z0-9_]+)"\s*$"#,
        )
        .expect("context pattern is valid")
    })
}

fn msgid_regex() -> &'static Regex {
    MSGID_REGEX.get_or_init(|| Regex::new(r#"^msgid\s+"(?P<text>.*)"\s*$"#).expect("msgid pattern is valid"))
}

fn msgstr_regex() -> &'static Regex {
    MSGSTR_REGEX.get_or_init(|| Regex::new(r#"^msgstr\s+"(?P<text>.*)"\s*$"#).expect("msgstr pattern is valid"))
}

/// File name of the catalog of `language`.
pub fn file_name(language: &Language) -> String {
    format!("{}.po", language.code())
}

/// Escape text for a quoted catalog string.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Reverse [`escape`]. Also accepts `\'`. Unknown escapes are kept verbatim.
pub fn unescape(text: &str) -> String {
    let mut unescaped = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            unescaped.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => unescaped.push('\\'),
            Some('"') => unescaped.push('"'),
            Some('\'') => unescaped.push('\''),
            Some('n') => unescaped.push('\n'),
            Some('r') => unescaped.push('\r'),
            Some('t') => unescaped.push('\t'),
            Some(other) => {
                unescaped.push('\\');
                unescaped.push(other);
            }
            None => unescaped.push('\\'),
        }
    }
    unescaped
}

// ==================== Export ====================

/// Optional header fields of an exported catalog.
#[derive(Debug, Clone, Default)]
pub struct CatalogHeader {
    pub project: Option<String>,
    pub last_translator: Option<String>,
}

fn render_header(out: &mut String, language: &Language, header: &CatalogHeader) {
    let project = header.project.as_deref().unwrap_or("fieldtrans");
    let _ = writeln!(out, "# {} translations ({})", project, language);
    out.push_str("msgid \"\"\nmsgstr \"\"\n");
    let _ = writeln!(out, "\"Project-Id-Version: {}\\n\"", escape(project));
    if let Some(translator) = &header.last_translator {
        let _ = writeln!(out, "\"Last-Translator: {}\\n\"", escape(translator));
    }
    let _ = writeln!(out, "\"Language: {}\\n\"", language);
    out.push_str("\"MIME-Version: 1.0\\n\"\n");
    out.push_str("\"Content-Type: text/plain; charset=UTF-8\\n\"\n");
    out.push_str("\"Content-Transfer-Encoding: 8bit\\n\"\n\n");
}

/// Append the catalog entry of one stored record.
pub fn render_entry(out: &mut String, id: RecordId, record: &TranslationRecord) {
    let key = &record.key;
    if record.is_fuzzy {
        out.push_str(FUZZY_MARKER);
        out.push('\n');
    }
    let _ = writeln!(
        out,
        "msgctxt \"{}--{}--{}--{}--{}\"",
        id, key.namespace, key.type_name, key.object_id, key.field
    );
    let _ = writeln!(out, "msgid \"{}\"", escape(&record.source_text));
    let _ = writeln!(
        out,
        "msgstr \"{}\"",
        escape(record.translated_text.as_deref().unwrap_or_default())
    );
    out.push('\n');
}

/// Render every stored record of `language` as a catalog, reading
/// `page_size` records at a time.
pub async fn export(
    store: &dyn TranslationStore,
    language: &Language,
    header: &CatalogHeader,
    page_size: usize,
) -> Result<String> {
    let page_size = page_size.max(1);
    let mut out = String::new();
    render_header(&mut out, language, header);

    let mut exported = 0;
    let mut after = None;
    loop {
        let page = store
            .query(
                &RecordFilter::all()
                    .language(language)
                    .page(after, page_size),
            )
            .await?;
        let Some(last) = page.last() else { break };
        after = last.id;
        let full_page = page.len() == page_size;

        for record in &page {
            if let Some(id) = record.id {
                render_entry(&mut out, id, record);
                exported += 1;
            }
        }
        if !full_page {
            break;
        }
    }

    info!("Exported {} translations for {}", exported, language);
    Ok(out)
}

// ==================== Parsing ====================

/// One entry read from a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// 1-based line of the context line.
    pub line: usize,
    pub record_id: RecordId,
    pub namespace: String,
    pub type_name: String,
    pub object_id: ObjectId,
    pub field: String,
    /// `None` when the msgid line is missing or malformed. Only needed to
    /// create a record.
    pub source_text: Option<String>,
    pub translated_text: String,
    pub is_fuzzy: bool,
}

/// Entries read from a catalog plus the entries that had to be skipped.
#[derive(Debug, Default)]
pub struct ParsedCatalog {
    pub entries: Vec<CatalogEntry>,
    pub malformed: Vec<TranslationError>,
}

fn malformed(line: usize, reason: impl Into<String>) -> TranslationError {
    TranslationError::MalformedCatalogEntry {
        line,
        reason: reason.into(),
    }
}

fn parse_entry(lines: &[&str], index: usize, context: &regex::Captures<'_>) -> Result<CatalogEntry> {
    let line = index + 1;
    let number = |name: &str| -> Result<i64> {
        context[name]
            .parse::<i64>()
            .map_err(|e| malformed(line, format!("invalid {}: {}", name, e)))
    };
    let record_id = number("id")?;
    let object_id = number("object_id")?;

    let source_text = lines
        .get(index + 1)
        .and_then(|l| msgid_regex().captures(l))
        .map(|c| unescape(&c["text"]));
    let translated_text = lines
        .get(index + 2)
        .and_then(|l| msgstr_regex().captures(l))
        .map(|c| unescape(&c["text"]))
        .ok_or_else(|| malformed(line + 2, "expected a msgstr line"))?;

    Ok(CatalogEntry {
        line,
        record_id,
        namespace: context["namespace"].to_string(),
        type_name: context["type_name"].to_string(),
        object_id,
        field: context["field"].to_string(),
        source_text,
        translated_text,
        is_fuzzy: index > 0 && lines[index - 1] == FUZZY_MARKER,
    })
}

/// Header block, comment or blank line.
fn is_header_line(line: &str) -> bool {
    let line = line.trim();
    line.is_empty()
        || line.starts_with('#')
        || line.starts_with('"')
        || line == "msgid \"\""
        || line == "msgstr \"\""
}

/// Whether `text` holds anything besides a header block, comments and blank lines.
fn has_entry_candidates(text: &str) -> bool {
    text.lines().any(|line| !is_header_line(line))
}

/// Parse catalog text. Malformed entries are collected, not fatal.
pub fn parse(text: &str) -> ParsedCatalog {
    let lines: Vec<&str> = text.lines().collect();
    let mut parsed = ParsedCatalog::default();

    let mut index = 0;
    while index < lines.len() {
        let Some(context) = context_regex().captures(lines[index]) else {
            index += 1;
            continue;
        };
        match parse_entry(&lines, index, &context) {
            Ok(entry) => {
                parsed.entries.push(entry);
                index += ENTRY_STRIDE;
            }
            Err(e) => {
                warn!("Skipping catalog entry: {}", e);
                parsed.malformed.push(e);
                index += 1;
            }
        }
    }

    parsed
}

// ==================== Import ====================

/// Outcome of an import.
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Orphan sweep run before the import.
    pub swept: SweepReport,
    /// Existing records overwritten.
    pub updated: usize,
    /// Records created from the catalog.
    pub created: usize,
    /// Entries skipped as malformed or with an invalid key.
    pub skipped: Vec<TranslationError>,
}

impl ImportReport {
    pub fn imported(&self) -> usize {
        self.updated + self.created
    }
}

pub struct CatalogImporter {
    store: Arc<dyn TranslationStore>,
    collector: Arc<OrphanCollector>,
    languages: Arc<LanguageRegistry>,
}

impl CatalogImporter {
    pub fn new(
        store: Arc<dyn TranslationStore>,
        collector: Arc<OrphanCollector>,
        languages: Arc<LanguageRegistry>,
    ) -> Self {
        Self {
            store,
            collector,
            languages,
        }
    }

    /// Import a catalog into `language_code`.
    ///
    /// Runs an orphan sweep, then writes every imported entry in one atomic
    /// batch: either all entries are stored or none.
    pub async fn import(
        &self,
        text: &str,
        language_code: &str,
        actor: Option<ActorId>,
        cancel: &CancelFlag,
    ) -> Result<ImportReport> {
        let language = self.languages.translation_language(language_code)?;
        let mut report = ImportReport {
            swept: self.collector.sweep(None, cancel).await?,
            ..ImportReport::default()
        };

        let parsed = parse(text);
        report.skipped = parsed.malformed;

        let now = Utc::now();
        let mut planned: Vec<TranslationRecord> = Vec::new();
        let mut positions: HashMap<TranslationKey, usize> = HashMap::new();

        for entry in parsed.entries {
            let mut record = match self.store.get(entry.record_id).await? {
                Some(existing) => existing,
                None => {
                    let key = match TranslationKey::new(
                        entry.namespace.as_str(),
                        entry.type_name.as_str(),
                        entry.object_id,
                        entry.field.as_str(),
                        language.clone(),
                    ) {
                        Ok(key) => key,
                        Err(e) => {
                            warn!("Skipping catalog entry at line {}: {}", entry.line, e);
                            report.skipped.push(e);
                            continue;
                        }
                    };
                    match self.store.find(&key).await? {
                        Some(existing) => existing,
                        None => {
                            let Some(source_text) = entry.source_text.as_deref() else {
                                let e = malformed(entry.line + 1, "expected a msgid line");
                                warn!("Skipping catalog entry: {}", e);
                                report.skipped.push(e);
                                continue;
                            };
                            let mut created = TranslationRecord::new(key, source_text);
                            created.context = Some(IMPORT_CONTEXT.to_string());
                            created
                        }
                    }
                }
            };

            if let Some(&position) = positions.get(&record.key) {
                debug!("Entry at line {} repeats {}, last one wins", entry.line, record.key);
                apply_entry(&mut planned[position], &entry, now, actor);
                continue;
            }

            apply_entry(&mut record, &entry, now, actor);
            positions.insert(record.key.clone(), planned.len());
            planned.push(record);
        }

        if planned.is_empty() && has_entry_candidates(text) {
            warn!(
                "Catalog for {} produced no importable entries ({} skipped)",
                language,
                report.skipped.len()
            );
            return Err(TranslationError::NothingImported);
        }

        report.created = planned.iter().filter(|r| r.id.is_none()).count();
        report.updated = planned.len() - report.created;
        self.store.save_all(planned).await?;

        info!(
            "Imported catalog for {}: {} updated, {} created, {} skipped",
            language,
            report.updated,
            report.created,
            report.skipped.len()
        );
        Ok(report)
    }
}

fn apply_entry(
    record: &mut TranslationRecord,
    entry: &CatalogEntry,
    now: chrono::DateTime<Utc>,
    actor: Option<ActorId>,
) {
    record.translated_text = Some(entry.translated_text.clone());
    record.is_fuzzy = entry.is_fuzzy;
    record.enforce_fuzzy_invariant();
    record.stamp(now, actor);
}
