pub mod config;
pub mod context;
pub mod error;
pub mod ingestion;
pub mod normalizer;
pub mod pipeline;
pub mod records;
pub mod report;
pub mod schema_builder;
pub mod star_schema;
pub mod validation;

pub use config::{PipelineConfig, RangeBound};
pub use context::DimensionContext;
pub use error::{EtlError, Result};
pub use normalizer::Normalizer;
pub use pipeline::{Pipeline, PipelineOutcome};
pub use records::{RunBatch, SimulationRun};
pub use report::{Finding, ReportAggregator, ReportStatus, RuleFamily, Severity, ValidationReport};
pub use schema_builder::SchemaBuilder;
pub use star_schema::StarSchema;
pub use validation::Validator;
