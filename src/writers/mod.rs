pub mod delimited_writer;
pub mod parquet_writer;

pub use delimited_writer::{write_lines, DelimitedWriter};
pub use parquet_writer::ParquetWriter;
