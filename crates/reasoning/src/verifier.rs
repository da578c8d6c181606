use crate::error::VerificationFailure;
use crate::record::GenerationRecord;
use repotrace_indexer::{SourceIndex, UnitId, EXTERN_PREFIX};
use serde::Serialize;

/// A record that passed every check; the only input the dataset emitter accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VerifiedRecord(GenerationRecord);

impl VerifiedRecord {
    #[must_use]
    pub const fn record(&self) -> &GenerationRecord {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> GenerationRecord {
        self.0
    }
}

impl AsRef<GenerationRecord> for VerifiedRecord {
    fn as_ref(&self) -> &GenerationRecord {
        &self.0
    }
}

/// Pure citation and integration-point checks against one index version
pub struct Verifier<'a> {
    index: &'a SourceIndex,
}

impl<'a> Verifier<'a> {
    #[must_use]
    pub const fn new(index: &'a SourceIndex) -> Self {
        Self { index }
    }

    /// Check `record` without touching the index or the evidence.
    ///
    /// Order: every citation resolves to an indexed unit, then belongs to the
    /// evidence; evidence text still matches the index; the trace cites something;
    /// design proposals name integration points admitted by the originating flow,
    /// and every internal one is a unit whose span is in the evidence.
    pub fn check(&self, record: &GenerationRecord) -> Result<(), VerificationFailure> {
        let citations = record.citations();

        for cited in &citations {
            let Some(id) = self.resolve(cited) else {
                return Err(VerificationFailure::UnknownCitation {
                    citation: cited.clone(),
                });
            };
            if !record.evidence.contains(&id) {
                return Err(VerificationFailure::NotInEvidence {
                    citation: cited.clone(),
                });
            }
        }

        for span in record.evidence.spans() {
            let current = self.index.slice(span.id.path(), &span.span);
            if current != Some(span.text.as_str()) {
                return Err(VerificationFailure::StaleEvidence {
                    id: span.id.to_string(),
                });
            }
        }

        if citations.is_empty() {
            return Err(VerificationFailure::Uncited);
        }

        if record.intent.needs_integration_points() {
            if record.integration_points.is_empty() {
                return Err(VerificationFailure::MissingIntegrationPoints);
            }
            let origin = record
                .evidence
                .origin()
                .ok_or(VerificationFailure::MissingOrigin)?;
            if let Some(point) = record
                .integration_points
                .iter()
                .find(|point| !origin.admits(point))
            {
                return Err(VerificationFailure::IntegrationPointOutsideFlow {
                    point: point.clone(),
                });
            }
            if let Some(point) = record
                .integration_points
                .iter()
                .find(|point| !Self::was_shown(record, point))
            {
                return Err(VerificationFailure::IntegrationPointNotInEvidence {
                    point: point.clone(),
                });
            }
        }

        Ok(())
    }

    /// Check and seal `record`; a rejected record is dropped
    pub fn verify(&self, record: GenerationRecord) -> Result<VerifiedRecord, VerificationFailure> {
        self.check(&record)?;
        Ok(VerifiedRecord(record))
    }

    /// External symbols have no span; internal points must be quoted in the evidence
    fn was_shown(record: &GenerationRecord, point: &str) -> bool {
        if point.starts_with(EXTERN_PREFIX) {
            return true;
        }
        point
            .parse::<UnitId>()
            .is_ok_and(|id| record.evidence.contains(&id))
    }

    fn resolve(&self, cited: &str) -> Option<UnitId> {
        let id = cited.parse::<UnitId>().ok()?;
        self.index.contains(&id).then_some(id)
    }
}
