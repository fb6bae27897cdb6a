//! Collaborators around the core: reading run directories and writing the
//! built tables out as Parquet.

pub mod columnar_writer;
pub mod run_reader;

pub use columnar_writer::{validate_table_name, ParquetTableWriter, REPORT_FILE};
pub use run_reader::RunDirectoryReader;
