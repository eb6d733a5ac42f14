//! Bulk updater: reconciles every instance of every translatable type.
//!
//! Run after a content migration or as an operator maintenance action,
//! normally right after an orphan sweep so that stale records are not
//! touched again.

use crate::cancel::CancelFlag;
use crate::error::{Result, TranslationError};
use crate::model::Criteria;
use crate::objects::{ObjectStore, Page};
use crate::orphans::DEFAULT_PAGE_SIZE;
use crate::schema::{TypeDescriptor, TypeRegistry};
use crate::sync::{SyncOptions, Synchronizer};
use std::sync::Arc;
use tracing::{error, info};

/// Context annotation of records created by a bulk update.
pub const BULK_CONTEXT: &str = "Bulk update";

/// Outcome of a bulk update.
#[derive(Debug, Default)]
pub struct BulkReport {
    /// Objects reconciled.
    pub objects: usize,
    /// Records written.
    pub updated: usize,
    /// Skipped pairs and aborted types.
    pub errors: Vec<TranslationError>,
}

pub struct BulkUpdater {
    sync: Arc<Synchronizer>,
    objects: Arc<dyn ObjectStore>,
    types: Arc<TypeRegistry>,
    page_size: usize,
}

impl BulkUpdater {
    pub fn new(sync: Arc<Synchronizer>, objects: Arc<dyn ObjectStore>, types: Arc<TypeRegistry>) -> Self {
        Self {
            sync,
            objects,
            types,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Reconcile every object matching `criteria` (all objects when `None`).
    ///
    /// A store failure aborts the type being processed; types already
    /// processed keep their committed progress and the next type starts.
    /// Cancellation stops the whole run.
    pub async fn update_all(&self, criteria: Option<&Criteria>, cancel: &CancelFlag) -> Result<BulkReport> {
        let criteria = criteria.cloned().unwrap_or_default();
        let mut report = BulkReport::default();
        let types = self.types.translatable_types();

        info!("Starting bulk update of {} types", types.len());

        for descriptor in &types {
            match self.update_type(descriptor, &criteria, cancel, &mut report).await {
                Ok(()) => {}
                Err(TranslationError::Cancelled) => return Err(TranslationError::Cancelled),
                Err(e) => {
                    error!("Bulk update of {} aborted: {}", descriptor.type_ref, e);
                    report.errors.push(e);
                }
            }
        }

        info!(
            "Bulk update finished: {} objects, {} records, {} errors",
            report.objects,
            report.updated,
            report.errors.len()
        );
        Ok(report)
    }

    async fn update_type(
        &self,
        descriptor: &TypeDescriptor,
        criteria: &Criteria,
        cancel: &CancelFlag,
        report: &mut BulkReport,
    ) -> Result<()> {
        let options = SyncOptions::new().context(BULK_CONTEXT);
        let mut page = Page::first(self.page_size);

        loop {
            cancel.check()?;
            let batch = self
                .objects
                .query(&descriptor.type_ref, criteria, page)
                .await?;

            for object in &batch {
                let synced = self.sync.reconcile(object, &options).await?;
                report.objects += 1;
                report.updated += synced.count();
                report.errors.extend(synced.errors);
            }

            if batch.len() < page.limit {
                return Ok(());
            }
            page = page.next();
        }
    }
}
