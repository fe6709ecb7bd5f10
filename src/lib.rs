#![allow(clippy::collapsible_if)]

pub mod language;
pub mod report;

#[cfg(test)]
mod tests;
