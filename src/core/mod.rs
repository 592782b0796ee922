pub mod aggregator;
pub mod classifier;
pub mod finalize;
pub mod labeler;
pub mod patterns;
pub mod record;
pub mod sink;
pub mod tokenizer;
