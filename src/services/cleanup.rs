use std::sync::Arc;

use uuid::Uuid;

use crate::{
    models::document::DocumentKind,
    services::rewriter::{rewrite_content, target_set},
    store::DocumentStore,
};

/// A failure met during a cleanup pass. Already logged when recorded.
#[derive(Debug, Clone)]
pub struct CleanupFailure {
    pub target: Uuid,
    pub kind: DocumentKind,
    pub document_id: Option<Uuid>,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct CleanupReport {
    pub rewritten: Vec<(DocumentKind, Uuid)>,
    pub failures: Vec<CleanupFailure>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Removes blocks that embed deleted media from a tenant's lessons and
/// courses.
///
/// Runs one target id at a time: a substring pre-filter in the document
/// store narrows the candidates, then each candidate is parsed and
/// rewritten, and written back only when something was removed. Every
/// failure is logged and the pass moves on, so re-running it later
/// finishes whatever was missed.
#[derive(Clone)]
pub struct ContentCleanup {
    documents: Arc<dyn DocumentStore>,
}

impl ContentCleanup {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    pub async fn purge_references(&self, target_ids: &[Uuid], tenant_id: Uuid) -> CleanupReport {
        let mut report = CleanupReport::default();
        if target_ids.is_empty() {
            return report;
        }

        tracing::info!(tenant_id = %tenant_id, targets = target_ids.len(), "cleaning up media references");

        for &target in target_ids {
            for kind in DocumentKind::ALL {
                self.purge_target(kind, target, tenant_id, &mut report).await;
            }
        }

        if !report.is_clean() {
            tracing::warn!(
                tenant_id = %tenant_id,
                failures = report.failures.len(),
                "media reference cleanup finished with failures"
            );
        }
        report
    }

    async fn purge_target(
        &self,
        kind: DocumentKind,
        target: Uuid,
        tenant_id: Uuid,
        report: &mut CleanupReport,
    ) {
        let needle = target.to_string();
        let candidate_ids = match self
            .documents
            .find_ids_where_content_contains(kind, &needle, tenant_id)
            .await
        {
            Ok(ids) => ids,
            Err(e) => {
                record(report, target, kind, None, &e);
                return;
            }
        };
        if candidate_ids.is_empty() {
            return;
        }

        let documents = match self.documents.get_by_ids(kind, &candidate_ids).await {
            Ok(docs) => docs,
            Err(e) => {
                record(report, target, kind, None, &e);
                return;
            }
        };

        let targets = target_set(&[target]);
        for doc in documents {
            if doc.tenant_id != tenant_id {
                continue;
            }
            let Some(content) = rewrite_content(&doc.content, &targets) else {
                tracing::debug!(asset_id = %target, kind = %kind, document_id = %doc.id, "pre-filter match without a reference");
                continue;
            };
            match self.documents.replace_content(kind, doc.id, &content).await {
                Ok(()) => {
                    tracing::info!(asset_id = %target, kind = %kind, document_id = %doc.id, "removed media reference");
                    report.rewritten.push((kind, doc.id));
                }
                Err(e) => record(report, target, kind, Some(doc.id), &e),
            }
        }
    }
}

fn record(
    report: &mut CleanupReport,
    target: Uuid,
    kind: DocumentKind,
    document_id: Option<Uuid>,
    error: &anyhow::Error,
) {
    tracing::error!(
        asset_id = %target,
        kind = %kind,
        document_id = ?document_id,
        error = %error,
        "media reference cleanup step failed"
    );
    report.failures.push(CleanupFailure {
        target,
        kind,
        document_id,
        error: error.to_string(),
    });
}
