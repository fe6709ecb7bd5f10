//! Static-profile emitter.
//!
//! The static host is ownership-disciplined: tagged unions are dispatched
//! with a single native match whose arms bind payload fields by reference,
//! and early exits use the host's own return and failure forms. Runs of
//! pattern arms over the same subject collapse into one match; boolean arms
//! stay as conditionals.

use crate::language::emit::out::{
    OutBinding, OutExpr, OutFieldBinding, OutMatchArm, OutPattern, OutStmt,
};
use crate::language::emit::{Driver, Emitter};
use crate::language::lower::{IrAbort, IrArm, IrBindingSource, IrChain, IrTest};

#[derive(Debug, Default)]
pub struct NativeEmitter;

impl NativeEmitter {
    pub fn new() -> Self {
        Self
    }

    fn emit_arms(&self, arms: &[IrArm], fallthrough: &[OutStmt], driver: &Driver<'_, Self>) -> Vec<OutStmt> {
        let Some(first) = arms.first() else {
            return fallthrough.to_vec();
        };
        match &first.test {
            IrTest::Cond => {
                let rest = self.emit_arms(&arms[1..], fallthrough, driver);
                let mut then_body = Vec::new();
                self.push_arm_body(first, &mut then_body, &rest, driver);
                vec![OutStmt::If {
                    condition: driver.value(&first.subject),
                    then_body,
                    else_body: rest,
                }]
            }
            IrTest::Always => {
                // Unconditional arm: later arms and the fallthrough are dead.
                let mut body = Vec::new();
                self.push_arm_body(first, &mut body, fallthrough, driver);
                body
            }
            _ => {
                // Maximal run of pattern arms over the same subject becomes
                // one native match.
                let run = arms
                    .iter()
                    .take_while(|arm| {
                        arm.subject == first.subject
                            && !matches!(arm.test, IrTest::Cond | IrTest::Always)
                    })
                    .count();
                let default = self.emit_arms(&arms[run..], fallthrough, driver);
                let out_arms = arms[..run]
                    .iter()
                    .map(|arm| OutMatchArm {
                        pattern: self.pattern_of(arm),
                        guard: arm.guard.as_ref().map(|g| driver.value(g)),
                        body: self.arm_body(arm, driver),
                    })
                    .collect();
                vec![OutStmt::MatchArms {
                    subject: driver.value(&first.subject),
                    arms: out_arms,
                    default,
                }]
            }
        }
    }

    fn pattern_of(&self, arm: &IrArm) -> OutPattern {
        match &arm.test {
            IrTest::Variant { enum_name, variant } => OutPattern::Variant {
                enum_name: enum_name.clone(),
                variant: variant.clone(),
                fields: arm
                    .bindings
                    .iter()
                    .filter_map(|b| match &b.source {
                        IrBindingSource::VariantField(index) => Some(OutFieldBinding {
                            index: *index,
                            name: b.name.clone(),
                            by_ref: b.by_ref,
                        }),
                        _ => None,
                    })
                    .collect(),
            },
            IrTest::IsSome => OutPattern::Some(
                arm.bindings
                    .iter()
                    .find(|b| matches!(b.source, IrBindingSource::OptionPayload))
                    .map(|b| OutBinding {
                        name: b.name.clone(),
                        by_ref: b.by_ref,
                    }),
            ),
            IrTest::IsNone => OutPattern::None,
            IrTest::Eq(lit) => OutPattern::Literal(lit.clone()),
            IrTest::Cond | IrTest::Always => OutPattern::Wildcard,
        }
    }

    /// Body for a match arm: pattern-covered bindings are already introduced
    /// by the pattern itself, anything else (whole-value and struct-field
    /// bindings) is bound explicitly up front.
    fn arm_body(&self, arm: &IrArm, driver: &Driver<'_, Self>) -> Vec<OutStmt> {
        let subject = driver.value(&arm.subject);
        let mut body = Vec::new();
        for binding in &arm.bindings {
            let value = match &binding.source {
                IrBindingSource::Whole => subject.clone(),
                IrBindingSource::StructField(field) => OutExpr::Field {
                    base: Box::new(subject.clone()),
                    field: field.clone(),
                },
                // Introduced by the pattern.
                IrBindingSource::VariantField(_) | IrBindingSource::OptionPayload => continue,
            };
            let value = if binding.by_ref {
                OutExpr::Ref {
                    mutable: false,
                    value: Box::new(value),
                }
            } else {
                value
            };
            body.push(OutStmt::ConstBind {
                name: binding.name.clone(),
                value,
            });
        }
        body.extend(driver.emit_steps(&arm.body));
        body
    }

    /// Body for a conditional arm, with its guard folded in as a nested
    /// conditional so a failed guard falls through.
    fn push_arm_body(
        &self,
        arm: &IrArm,
        out: &mut Vec<OutStmt>,
        rest: &[OutStmt],
        driver: &Driver<'_, Self>,
    ) {
        let mut body = self.arm_body_without_guard(arm, driver);
        match &arm.guard {
            Some(guard) => out.push(OutStmt::If {
                condition: driver.value(guard),
                then_body: body,
                else_body: rest.to_vec(),
            }),
            None => out.append(&mut body),
        }
    }

    fn arm_body_without_guard(&self, arm: &IrArm, driver: &Driver<'_, Self>) -> Vec<OutStmt> {
        let subject = driver.value(&arm.subject);
        let mut body = Vec::new();
        for binding in &arm.bindings {
            let value = match &binding.source {
                IrBindingSource::Whole => subject.clone(),
                IrBindingSource::StructField(field) => OutExpr::Field {
                    base: Box::new(subject.clone()),
                    field: field.clone(),
                },
                IrBindingSource::VariantField(index) => OutExpr::PayloadAt {
                    subject: Box::new(subject.clone()),
                    index: *index,
                },
                IrBindingSource::OptionPayload => OutExpr::MethodCall {
                    receiver: Box::new(subject.clone()),
                    method: "unwrap".to_string(),
                    args: Vec::new(),
                },
            };
            let value = if binding.by_ref {
                OutExpr::Ref {
                    mutable: false,
                    value: Box::new(value),
                }
            } else {
                value
            };
            body.push(OutStmt::ConstBind {
                name: binding.name.clone(),
                value,
            });
        }
        body.extend(driver.emit_steps(&arm.body));
        body
    }
}

impl Emitter for NativeEmitter {
    fn emit_chain(&self, chain: &IrChain, driver: &Driver<'_, Self>) -> Vec<OutStmt> {
        let fallthrough = driver.emit_steps(&chain.fallthrough);
        self.emit_arms(&chain.arms, &fallthrough, driver)
    }

    fn emit_abort(&self, abort: &IrAbort, driver: &Driver<'_, Self>) -> OutStmt {
        match abort {
            IrAbort::Return(value) => OutStmt::Return(value.as_ref().map(|v| driver.value(v))),
            IrAbort::Panic(message) => OutStmt::Fail(message.as_ref().map(|v| driver.value(v))),
        }
    }
}
