//! One pipeline invocation: normalize, build, validate, aggregate.

use crate::config::PipelineConfig;
use crate::normalizer::Normalizer;
use crate::records::{ExcludedRun, RunBatch};
use crate::report::{Finding, ReportAggregator, RuleFamily, ValidationReport};
use crate::schema_builder::SchemaBuilder;
use crate::star_schema::StarSchema;
use crate::validation::Validator;
use tracing::{info, info_span, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub invocation_id: Uuid,
    /// `None` when normalization failed or the batch was empty
    pub star_schema: Option<StarSchema>,
    pub report: ValidationReport,
}

impl PipelineOutcome {
    /// Loading proceeds unless the report is fatal.
    pub fn should_load(&self) -> bool {
        !self.report.is_fatal() && self.star_schema.is_some()
    }
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self, mut batch: RunBatch) -> PipelineOutcome {
        let invocation_id = Uuid::new_v4();
        let span = info_span!("pipeline", invocation = %invocation_id);
        let _guard = span.enter();
        info!(
            "Starting pipeline over {} runs ({} excluded by extraction)",
            batch.runs.len(),
            batch.excluded.len()
        );

        exclude_unplaceable_runs(&mut batch);
        let mut aggregator = ReportAggregator::new();
        aggregator.extend(self.extraction_findings(&batch));

        if batch.runs.is_empty() {
            aggregator.push(Finding::error(
                RuleFamily::Extraction,
                "extraction.empty_batch",
                "no simulation runs to process",
                Vec::new(),
            ));
            return finish(invocation_id, None, aggregator);
        }

        let normalizer = Normalizer::new();
        let conflicts = normalizer.find_conflicts(&batch.runs);
        if !conflicts.is_empty() {
            warn!("{} dimension attribute conflicts, no fact tables built", conflicts.len());
            for conflict in &conflicts {
                aggregator.push(Finding::error(
                    RuleFamily::ReferentialIntegrity,
                    format!("referential_integrity.{}", conflict.dimension),
                    conflict.message(),
                    conflict.row_refs(),
                ));
            }
            return finish(invocation_id, None, aggregator);
        }

        let dims = match normalizer.normalize(&batch.runs) {
            Ok(dims) => dims,
            Err(e) => {
                aggregator.push(Finding::error(
                    RuleFamily::ReferentialIntegrity,
                    "referential_integrity.normalize",
                    e.to_string(),
                    Vec::new(),
                ));
                return finish(invocation_id, None, aggregator);
            }
        };

        let built = SchemaBuilder::from_config(&self.config).build(dims, &batch.runs);
        aggregator.extend(built.defects);

        if self.config.skip_validation {
            info!("Validation skipped by configuration");
        } else {
            let validator = Validator::from_config(&self.config);
            aggregator.extend(validator.validate(&built.schema));
        }

        finish(invocation_id, Some(built.schema), aggregator)
    }

    /// One finding per excluded run; errors once too large a share was excluded.
    fn extraction_findings(&self, batch: &RunBatch) -> Vec<Finding> {
        let total = batch.total_runs();
        if batch.excluded.is_empty() || total == 0 {
            return Vec::new();
        }
        let fraction = batch.excluded.len() as f64 / total as f64;
        let escalate = fraction > self.config.max_excluded_run_fraction;
        if escalate {
            warn!(
                "{} of {} runs excluded, above the {:.0}% limit",
                batch.excluded.len(),
                total,
                self.config.max_excluded_run_fraction * 100.0
            );
        }
        batch
            .excluded
            .iter()
            .map(|run| {
                let rule_name = format!("extraction.{}", run.run_id);
                let message = format!("run {} excluded: {}", run.run_id, run.reason);
                let refs = vec![run.run_id.clone()];
                if escalate {
                    Finding::error(RuleFamily::Extraction, rule_name, message, refs)
                } else {
                    Finding::warning(RuleFamily::Extraction, rule_name, message, refs)
                }
            })
            .collect()
    }
}

/// Moves runs whose hourly window cannot be laid out into the exclusions.
fn exclude_unplaceable_runs(batch: &mut RunBatch) {
    let (runs, unplaceable): (Vec<_>, Vec<_>) = std::mem::take(&mut batch.runs)
        .into_iter()
        .map(|run| {
            let window = run.metadata.window_end();
            (run, window)
        })
        .partition(|(_, window)| window.is_ok());
    batch.runs = runs.into_iter().map(|(run, _)| run).collect();
    for (run, window) in unplaceable {
        if let Err(e) = window {
            warn!("Run {} excluded: {}", run.run_id, e);
            batch.excluded.push(ExcludedRun {
                run_id: run.run_id,
                reason: e.to_string(),
            });
        }
    }
}

fn finish(
    invocation_id: Uuid,
    star_schema: Option<StarSchema>,
    aggregator: ReportAggregator,
) -> PipelineOutcome {
    let report = aggregator.finish();
    info!(
        "Pipeline finished with status {} ({} errors, {} warnings)",
        report.status,
        report.error_count(),
        report.warning_count()
    );
    PipelineOutcome {
        invocation_id,
        star_schema,
        report,
    }
}
