//! Code emission.
//!
//! One driver walks the IR; the two backends plug into it through the
//! [`Emitter`] trait. The trait is deliberately small: the profiles agree on
//! everything except how a chain of tagged-union arms is dispatched and how
//! an early exit is spelled. Keeping the interface that narrow is what makes
//! the behavioral-equivalence guarantee checkable.

pub mod out;

mod dynamic;
mod native;

pub use dynamic::DynamicEmitter;
pub use native::NativeEmitter;

use crate::language::lower::{
    IrAbort, IrBindingSource, IrChain, IrFunction, IrPlugin, IrProgram, IrStep, IrValue,
};
use out::{OutExpr, OutFunction, OutParam, OutPlugin, OutProgram, OutStmt};

pub trait Emitter: Sized {
    /// Renders a normalized conditional chain: arm tests, binding
    /// introductions, guards, bodies, and the explicit fallthrough.
    fn emit_chain(&self, chain: &IrChain, driver: &Driver<'_, Self>) -> Vec<OutStmt>;

    /// Renders an early exit from the current plugin function.
    fn emit_abort(&self, abort: &IrAbort, driver: &Driver<'_, Self>) -> OutStmt;

    /// Value conversion. The default is the one-to-one mapping; the dynamic
    /// profile overrides it to erase ownership markers.
    fn emit_value(&self, value: &IrValue, driver: &Driver<'_, Self>) -> OutExpr {
        driver.default_value(value)
    }
}

pub fn emit_program<E: Emitter>(ir: &IrProgram, emitter: &E) -> OutProgram {
    let driver = Driver { emitter };
    OutProgram {
        module_name: ir.module_name.clone(),
        plugins: ir.plugins.iter().map(|p| driver.emit_plugin(p)).collect(),
        functions: ir
            .functions
            .iter()
            .map(|f| driver.emit_function(f))
            .collect(),
    }
}

/// Shared IR walker. Everything backend-neutral lives here; chains, aborts
/// and values are delegated back to the emitter.
pub struct Driver<'e, E> {
    emitter: &'e E,
}

impl<'e, E: Emitter> Driver<'e, E> {
    fn emit_plugin(&self, plugin: &IrPlugin) -> OutPlugin {
        OutPlugin {
            name: plugin.name.clone(),
            functions: plugin
                .functions
                .iter()
                .map(|f| self.emit_function(f))
                .collect(),
        }
    }

    pub fn emit_function(&self, function: &IrFunction) -> OutFunction {
        OutFunction {
            name: function.name.clone(),
            params: function
                .params
                .iter()
                .map(|p| OutParam {
                    name: p.name.clone(),
                    by_ref: p.by_ref,
                    mutable: p.mutable,
                })
                .collect(),
            returns_value: function.returns_value,
            body: self.emit_steps(&function.body),
        }
    }

    pub fn emit_steps(&self, steps: &[IrStep]) -> Vec<OutStmt> {
        let mut out = Vec::new();
        for step in steps {
            match step {
                IrStep::Declare { name } => out.push(OutStmt::Declare { name: name.clone() }),
                IrStep::Let {
                    name,
                    mutable,
                    value,
                } => out.push(OutStmt::LetBind {
                    name: name.clone(),
                    mutable: *mutable,
                    value: self.value(value),
                }),
                IrStep::Assign { target, value } => {
                    let mut place = OutExpr::Var(target.root.clone());
                    for projection in &target.path {
                        place = match projection {
                            crate::language::lower::IrProjection::Field(field) => OutExpr::Field {
                                base: Box::new(place),
                                field: field.clone(),
                            },
                            crate::language::lower::IrProjection::Deref => {
                                OutExpr::Deref(Box::new(place))
                            }
                        };
                    }
                    out.push(OutStmt::Assign {
                        target: place,
                        value: self.value(value),
                    });
                }
                IrStep::Eval(value) => out.push(OutStmt::Eval(self.value(value))),
                IrStep::Chain(chain) => out.extend(self.emitter.emit_chain(chain, self)),
                IrStep::While { condition, body } => out.push(OutStmt::While {
                    condition: self.value(condition),
                    body: self.emit_steps(body),
                }),
                IrStep::For {
                    binding,
                    iter,
                    body,
                } => out.push(OutStmt::For {
                    binding: binding.clone(),
                    iter: self.value(iter),
                    body: self.emit_steps(body),
                }),
                IrStep::Traverse(traverse) => out.push(OutStmt::Traverse {
                    target: self.value(&traverse.target),
                    mut_captures: traverse.mut_captures.clone(),
                    shared_captures: traverse.shared_captures.clone(),
                    state: self.emit_steps(&traverse.state),
                    visitors: traverse
                        .visitors
                        .iter()
                        .map(|v| self.emit_function(v))
                        .collect(),
                }),
                IrStep::Scope(steps) => out.push(OutStmt::Scope(self.emit_steps(steps))),
                IrStep::Abort(abort) => out.push(self.emitter.emit_abort(abort, self)),
                IrStep::Break => out.push(OutStmt::Break),
                IrStep::Continue => out.push(OutStmt::Continue),
            }
        }
        out
    }

    pub fn value(&self, value: &IrValue) -> OutExpr {
        self.emitter.emit_value(value, self)
    }

    pub fn default_value(&self, value: &IrValue) -> OutExpr {
        match value {
            IrValue::Unit => OutExpr::Unit,
            IrValue::Literal(lit) => OutExpr::Literal(lit.clone()),
            IrValue::Var(name) => OutExpr::Var(name.clone()),
            IrValue::Binary { op, left, right } => OutExpr::Binary {
                op: *op,
                left: Box::new(self.value(left)),
                right: Box::new(self.value(right)),
            },
            IrValue::Unary { op, value } => OutExpr::Unary {
                op: *op,
                value: Box::new(self.value(value)),
            },
            IrValue::Call { function, args } => OutExpr::Call {
                function: function.clone(),
                args: args.iter().map(|a| self.value(a)).collect(),
            },
            IrValue::NamespaceCall {
                namespace,
                function,
                args,
            } => OutExpr::NamespaceCall {
                namespace: namespace.clone(),
                function: function.clone(),
                args: args.iter().map(|a| self.value(a)).collect(),
            },
            IrValue::MethodCall {
                receiver,
                method,
                args,
            } => OutExpr::MethodCall {
                receiver: Box::new(self.value(receiver)),
                method: method.clone(),
                args: args.iter().map(|a| self.value(a)).collect(),
            },
            IrValue::Field { base, field } => OutExpr::Field {
                base: Box::new(self.value(base)),
                field: field.clone(),
            },
            IrValue::StructNew {
                name,
                fields,
                spread,
            } => OutExpr::StructNew {
                name: name.clone(),
                fields: fields
                    .iter()
                    .map(|(f, v)| (f.clone(), self.value(v)))
                    .collect(),
                spread: spread.as_ref().map(|s| Box::new(self.value(s))),
            },
            IrValue::VariantNew {
                enum_name,
                variant,
                args,
            } => OutExpr::VariantNew {
                enum_name: enum_name.clone(),
                variant: variant.clone(),
                args: args.iter().map(|a| self.value(a)).collect(),
            },
            IrValue::VecNew(elements) => {
                OutExpr::VecNew(elements.iter().map(|e| self.value(e)).collect())
            }
            IrValue::Ref { mutable, value } => OutExpr::Ref {
                mutable: *mutable,
                value: Box::new(self.value(value)),
            },
            IrValue::Deref(value) => OutExpr::Deref(Box::new(self.value(value))),
            IrValue::Extract { subject, source } => {
                let subject = self.value(subject);
                match source {
                    IrBindingSource::Whole => subject,
                    IrBindingSource::VariantField(index) => OutExpr::PayloadAt {
                        subject: Box::new(subject),
                        index: *index,
                    },
                    IrBindingSource::OptionPayload => OutExpr::MethodCall {
                        receiver: Box::new(subject),
                        method: "unwrap".to_string(),
                        args: Vec::new(),
                    },
                    IrBindingSource::StructField(field) => OutExpr::Field {
                        base: Box::new(subject),
                        field: field.clone(),
                    },
                }
            }
        }
    }
}
