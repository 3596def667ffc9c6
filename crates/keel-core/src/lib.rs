//! Keel Core - staged semantic analysis of declaration trees
//!
//! A [`SourceFile`](tree::SourceFile) goes through the passes in
//! [`resolve`]: type declarations are collected, signatures registered, and
//! finally every body is type-checked against a control-flow graph built by
//! [`cfg`]. [`analysis::AnalysisEngine`] is the entry point for tools.

pub mod analysis;
pub mod cfg;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod infer;
pub mod resolve;
pub mod semantic;
pub mod tree;
pub mod types;
