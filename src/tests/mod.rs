mod support;

mod discipline;
mod infer;
mod pipeline;
