pub mod ast;
pub mod diagnostics;
pub mod discipline;
pub mod emit;
pub mod errors;
pub mod infer;
pub mod lower;
pub mod modules;
pub mod pipeline;
pub mod resolve;
pub mod span;
pub mod types;
