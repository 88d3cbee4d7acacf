pub mod aggregator;
pub mod classifier;
pub mod extractor;
pub mod filename;
pub mod writer;
