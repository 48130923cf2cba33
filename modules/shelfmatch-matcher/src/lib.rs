pub mod cache;
pub mod embedder;
pub mod index;
pub mod pipeline;
pub mod report;
pub mod retry;
pub mod tables;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod verifier;
