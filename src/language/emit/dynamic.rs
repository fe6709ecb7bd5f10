//! Dynamic-profile emitter.
//!
//! The dynamic host has no static types and no references: tagged values are
//! dispatched with runtime shape tests, payloads are pulled out positionally
//! into single-assignment bindings, and ownership markers are erased. Early
//! exits become host exceptions so a failed rewrite unwinds out of the
//! visitor without touching the tree.

use crate::language::emit::out::{OutExpr, OutStmt, ShapeKind};
use crate::language::emit::{Driver, Emitter};
use crate::language::lower::{IrAbort, IrBindingSource, IrChain, IrTest, IrValue};

#[derive(Debug, Default)]
pub struct DynamicEmitter;

impl DynamicEmitter {
    pub fn new() -> Self {
        Self
    }

    fn test_condition(&self, test: &IrTest, subject: &OutExpr) -> Option<OutExpr> {
        match test {
            IrTest::Cond => Some(subject.clone()),
            IrTest::Variant { enum_name, variant } => Some(OutExpr::ShapeTest {
                subject: Box::new(subject.clone()),
                shape: ShapeKind::Variant {
                    enum_name: enum_name.clone(),
                    variant: variant.clone(),
                },
            }),
            IrTest::IsSome => Some(OutExpr::ShapeTest {
                subject: Box::new(subject.clone()),
                shape: ShapeKind::Some,
            }),
            IrTest::IsNone => Some(OutExpr::ShapeTest {
                subject: Box::new(subject.clone()),
                shape: ShapeKind::None,
            }),
            IrTest::Eq(lit) => Some(OutExpr::Binary {
                op: crate::language::ast::BinaryOp::Eq,
                left: Box::new(subject.clone()),
                right: Box::new(OutExpr::Literal(lit.clone())),
            }),
            IrTest::Always => None,
        }
    }

    fn extraction(&self, source: &IrBindingSource, subject: &OutExpr) -> OutExpr {
        match source {
            IrBindingSource::Whole => subject.clone(),
            IrBindingSource::VariantField(index) => OutExpr::PayloadAt {
                subject: Box::new(subject.clone()),
                index: *index,
            },
            IrBindingSource::OptionPayload => OutExpr::PayloadAt {
                subject: Box::new(subject.clone()),
                index: 0,
            },
            IrBindingSource::StructField(field) => OutExpr::Field {
                base: Box::new(subject.clone()),
                field: field.clone(),
            },
        }
    }
}

impl Emitter for DynamicEmitter {
    fn emit_chain(&self, chain: &IrChain, driver: &Driver<'_, Self>) -> Vec<OutStmt> {
        let mut rest = driver.emit_steps(&chain.fallthrough);
        for arm in chain.arms.iter().rev() {
            let subject = driver.value(&arm.subject);
            let mut then_body: Vec<OutStmt> = arm
                .bindings
                .iter()
                .map(|binding| OutStmt::ConstBind {
                    name: binding.name.clone(),
                    value: self.extraction(&binding.source, &subject),
                })
                .collect();
            let body = driver.emit_steps(&arm.body);
            match &arm.guard {
                // The guard sees the arm's bindings, so it nests inside them;
                // a failed guard falls through to the remaining arms.
                Some(guard) => then_body.push(OutStmt::If {
                    condition: driver.value(guard),
                    then_body: body,
                    else_body: rest.clone(),
                }),
                None => then_body.extend(body),
            }
            rest = match self.test_condition(&arm.test, &subject) {
                Some(condition) => vec![OutStmt::If {
                    condition,
                    then_body,
                    else_body: rest,
                }],
                // An unconditional arm makes everything after it unreachable.
                None => then_body,
            };
        }
        rest
    }

    fn emit_abort(&self, abort: &IrAbort, driver: &Driver<'_, Self>) -> OutStmt {
        match abort {
            IrAbort::Return(value) => OutStmt::Return(value.as_ref().map(|v| driver.value(v))),
            IrAbort::Panic(message) => OutStmt::Throw(message.as_ref().map(|v| driver.value(v))),
        }
    }

    fn emit_value(&self, value: &IrValue, driver: &Driver<'_, Self>) -> OutExpr {
        match value {
            IrValue::Ref { value, .. } => self.emit_value(value, driver),
            IrValue::Deref(value) => self.emit_value(value, driver),
            IrValue::Extract { subject, source } => {
                let subject = self.emit_value(subject, driver);
                self.extraction(source, &subject)
            }
            other => driver.default_value(other),
        }
    }
}
