use std::rc::Rc;

use crate::{
    ast::{Arm, Expr, Instruction, InstructionKind, LoopKind},
    diagnostics::{Diagnostic, DiagnosticKind, Result},
    scope::{Scope, ScopeRef},
    value::{Blame, Value},
};

use super::{Interpreter, Interrupt};

impl Interpreter {
    /// Runs instructions in order, stopping as soon as an interrupt is set.
    pub(crate) fn execute_block(&mut self, instructions: &[Instruction]) -> Result<()> {
        for instruction in instructions {
            self.execute(instruction)?;
            if self.interrupt.is_some() {
                break;
            }
        }
        Ok(())
    }

    pub(crate) fn in_scope<T>(&mut self, scope: ScopeRef, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = std::mem::replace(&mut self.scope, scope);
        let result = f(self);
        self.scope = saved;
        result
    }

    fn in_child_scope<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let child = Scope::child(&self.scope);
        self.in_scope(child, f)
    }

    fn execute(&mut self, instruction: &Instruction) -> Result<()> {
        match &instruction.kind {
            InstructionKind::Log(exprs) => {
                let text = self.display_all(exprs)?.join(" ");
                self.write_output(text.as_bytes())?;
                self.write_output(b"\n")
            }
            InstructionKind::Show(exprs) => {
                let text = self.display_all(exprs)?.concat();
                self.write_output(text.as_bytes())
            }
            InstructionKind::If {
                condition,
                then_arm,
                else_arm,
            } => self.in_child_scope(|this| {
                if this.eval(condition, true)?.is_truthy() {
                    this.execute_arm(then_arm)
                } else if let Some(arm) = else_arm {
                    this.execute_arm(arm)
                } else {
                    Ok(())
                }
            }),
            InstructionKind::Loop { kind, body } => self.in_child_scope(|this| match kind {
                LoopKind::Forever => this.execute_forever(body),
                LoopKind::While(condition) => this.execute_while(condition, body),
                LoopKind::Through {
                    key,
                    iterable,
                    condition,
                } => this.execute_through(key, iterable, condition.as_ref(), body),
            }),
            InstructionKind::Expr(expr) => self.eval(expr, true).map(drop),
            InstructionKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr, false)?,
                    None => Value::void(),
                };
                self.returned = Some(value);
                self.interrupt = Some(Interrupt::Return);
                Ok(())
            }
            InstructionKind::Break => {
                self.interrupt = Some(Interrupt::Break);
                Ok(())
            }
            InstructionKind::Skip => {
                self.interrupt = Some(Interrupt::Skip);
                Ok(())
            }
            InstructionKind::Catch {
                expr,
                binding,
                handler,
                otherwise,
            } => {
                let value = self.eval(expr, false)?;
                match value.as_blame() {
                    Some(blame) => {
                        let message = blame.message_value().cloned().unwrap_or_default();
                        self.in_child_scope(|this| {
                            if let Some(key) = binding {
                                Scope::set_local(&this.scope, key, message);
                            }
                            this.execute_block(handler)
                        })
                    }
                    None => match otherwise {
                        Some(block) => self.in_child_scope(|this| this.execute_block(block)),
                        None => Ok(()),
                    },
                }
            }
            InstructionKind::Load(name) => {
                let Some(constructor) = self.modules.get(name) else {
                    return Err(Diagnostic::new(DiagnosticKind::Runtime, "Unknown module name")
                        .with_position(instruction.position)
                        .with_source(Rc::clone(&self.source))
                        .into());
                };
                tracing::debug!(module = %name, "loading module");
                let module = constructor(self);
                Scope::set(&self.scope, name, module);
                Ok(())
            }
        }
    }

    fn display_all(&mut self, exprs: &[Expr]) -> Result<Vec<String>> {
        exprs
            .iter()
            .map(|expr| self.eval(expr, true).map(|value| value.display()))
            .collect()
    }

    fn execute_arm(&mut self, arm: &Arm) -> Result<()> {
        match arm {
            Arm::Block(instructions) => self.execute_block(instructions),
            Arm::Single(instruction) => self.execute(instruction),
        }
    }

    /// Consumes a break or skip after one pass over a loop body. `true`
    /// means the loop should stop.
    fn loop_should_stop(&mut self) -> bool {
        match self.interrupt {
            Some(Interrupt::Break) => {
                self.interrupt = None;
                true
            }
            Some(Interrupt::Skip) => {
                self.interrupt = None;
                false
            }
            Some(Interrupt::Return) => true,
            None => false,
        }
    }

    fn execute_forever(&mut self, body: &[Instruction]) -> Result<()> {
        loop {
            self.execute_block(body)?;
            if self.loop_should_stop() {
                return Ok(());
            }
        }
    }

    fn execute_while(&mut self, condition: &Expr, body: &[Instruction]) -> Result<()> {
        while self.eval(condition, true)?.is_truthy() {
            self.execute_block(body)?;
            if self.loop_should_stop() {
                break;
            }
        }
        Ok(())
    }

    fn execute_through(
        &mut self,
        key: &str,
        iterable: &Expr,
        condition: Option<&Expr>,
        body: &[Instruction],
    ) -> Result<()> {
        let items = self.eval(iterable, true)?;
        if items.length().is_none() {
            let blame = Blame::message("Expected an iterable").at(&self.source, iterable.position);
            return Err(self.explode(&blame));
        }

        let mut index = 0;
        // The length is re-read every pass; the iterable may grow.
        while let Some(item) = items.item(index) {
            index += 1;
            Scope::set(&self.scope, key, item);
            if let Some(condition) = condition {
                if !self.eval(condition, true)?.is_truthy() {
                    break;
                }
            }
            self.execute_block(body)?;
            if self.loop_should_stop() {
                break;
            }
        }
        Ok(())
    }

    /// Runs a match case body in its own scope; a `^` inside becomes the
    /// value of the match.
    pub(crate) fn execute_case(&mut self, body: &[Instruction]) -> Result<Value> {
        self.in_child_scope(|this| this.execute_block(body))?;
        if self.interrupt == Some(Interrupt::Return) {
            self.interrupt = None;
            return Ok(self.returned.take().unwrap_or_default());
        }
        Ok(Value::void())
    }
}
