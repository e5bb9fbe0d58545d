use std::rc::Rc;

use crate::{
    ast::{AssignOp, AssignTarget, Expr, ExprKind, LogicalOp, MatchExpr, UnaryOp},
    diagnostics::{Position, Result},
    scope::Scope,
    value::{
        ops::{self, Culprit, OpError},
        Argument, Arguments, Arity, Blame, CallError, RaelString, Routine, Value, ValueKind,
    },
};

use super::{Interpreter, Interrupt};

/// An expression result: a value, or a blame still missing its position.
type Outcome = std::result::Result<Value, Blame>;

impl Interpreter {
    /// Evaluates `expr`. A blame result is given this expression's position
    /// unless it already has one; with `explode` set it becomes fatal.
    pub(crate) fn eval(&mut self, expr: &Expr, explode: bool) -> Result<Value> {
        let value = match self.eval_kind(expr)? {
            Ok(value) => value,
            Err(blame) => Value::from(blame),
        };
        if let Some(blame) = value.as_blame() {
            blame.locate(&self.source, expr.position);
            if explode {
                return Err(self.explode(blame));
            }
        }
        Ok(value)
    }

    fn locate_op_error(&self, error: OpError, left: &Expr, right: &Expr) -> Blame {
        match error.culprit {
            Culprit::Left => error.blame.at(&self.source, left.position),
            Culprit::Right => error.blame.at(&self.source, right.position),
            Culprit::Expression => error.blame,
        }
    }

    fn eval_kind(&mut self, expr: &Expr) -> Result<Outcome> {
        Ok(Ok(match &expr.kind {
            ExprKind::Int(n) => Value::int(*n),
            ExprKind::Float(f) => Value::float(*f),
            ExprKind::String(bytes) => Value::string(RaelString::new(Rc::clone(bytes))),
            ExprKind::Void => Value::void(),
            ExprKind::Key(key) => self.lookup(key),
            ExprKind::Stack(items) => {
                let values = items
                    .iter()
                    .map(|item| self.eval(item, true))
                    .collect::<Result<Vec<_>>>()?;
                Value::stack(values)
            }
            ExprKind::Routine(decl) => {
                let scope = Rc::clone(&self.scope);
                self.track_scope(&scope);
                Value::new(ValueKind::Routine(Routine {
                    decl: Rc::clone(decl),
                    scope,
                    source: Rc::clone(&self.source),
                }))
            }
            ExprKind::Binary { op, left, right } => {
                let lhs = self.eval(left, true)?;
                let rhs = self.eval(right, true)?;
                match ops::binary(*op, &lhs, &rhs) {
                    Ok(value) => value,
                    Err(error) => return Ok(Err(self.locate_op_error(error, left, right))),
                }
            }
            ExprKind::Logical { op, left, right } => {
                let lhs = self.eval(left, true)?.is_truthy();
                let result = match op {
                    LogicalOp::And => lhs && self.eval(right, true)?.is_truthy(),
                    LogicalOp::Or => lhs || self.eval(right, true)?.is_truthy(),
                };
                Value::bool(result)
            }
            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand, true)?;
                return match ops::unary(*op, &value) {
                    Ok(prompt) if *op == UnaryOp::GetString => self.get_string(&prompt),
                    result => Ok(result),
                };
            }
            ExprKind::Blame(message) => {
                let message = match message {
                    Some(message) => Some(self.eval(message, true)?),
                    None => None,
                };
                return Ok(Err(Blame::new(message)));
            }
            ExprKind::Call { callee, args } => return self.eval_call(expr.position, callee, args),
            ExprKind::Member { target, key } => {
                let value = self.eval(target, true)?;
                match value.member(key) {
                    Some(member) => member,
                    None => {
                        self.warn_undefined(key);
                        Value::void()
                    }
                }
            }
            ExprKind::Assign { target, op, value } => return self.eval_assign(target, *op, value),
            ExprKind::Match(match_expr) => return self.eval_match(match_expr).map(Ok),
        }))
    }

    fn lookup(&self, key: &str) -> Value {
        Scope::get(&self.scope, key).unwrap_or_else(|| {
            self.warn_undefined(key);
            Value::void()
        })
    }

    fn get_string(&mut self, prompt: &Value) -> Result<Outcome> {
        self.write_output(prompt.display().as_bytes())?;
        Ok(match self.read_line()? {
            Some(line) => Ok(Value::string(line)),
            None => Err(Blame::message("EOF reached while reading stdin")),
        })
    }

    fn eval_call(&mut self, position: Position, callee: &Expr, args: &[Expr]) -> Result<Outcome> {
        let function = self.eval(callee, true)?;
        let Some(arity) = arity_of(&function) else {
            let message = match function.kind() {
                ValueKind::Type(_) => "Tried to construct a non-constructable type",
                _ => "Call not possible on a non-callable",
            };
            return Ok(Err(Blame::message(message)));
        };
        if let Err(blame) = arity.check(args.len()) {
            return Ok(Err(blame));
        }

        let mut items = Vec::with_capacity(args.len());
        for arg in args {
            items.push(Argument {
                value: self.eval(arg, true)?,
                position: arg.position,
            });
        }
        let arguments = Arguments::new(Rc::clone(&self.source), items);
        tracing::trace!(callee = %function.repr(), args = arguments.len(), line = position.line, "call");

        match function.kind() {
            ValueKind::Routine(routine) => self.call_routine(routine, arguments).map(Ok),
            ValueKind::NativeFunction(native) => match (native.function)(self, &arguments) {
                Ok(value) => Ok(Ok(value)),
                Err(CallError::Blame(blame)) => Ok(Err(blame)),
                Err(CallError::Fatal(err)) => Err(err),
            },
            ValueKind::BoundMethod(method) => Ok(method.call(&arguments)),
            ValueKind::Type(value_type) => Ok(value_type.construct(&arguments)),
            _ => Ok(Err(Blame::message("Call not possible on a non-callable"))),
        }
    }

    /// Runs a routine body in a child of its captured scope.
    fn call_routine(&mut self, routine: &Routine, arguments: Arguments) -> Result<Value> {
        let scope = Scope::child(&routine.scope);
        for (param, value) in routine.decl.params.iter().zip(arguments.into_values()) {
            Scope::set_local(&scope, param, value);
        }

        let saved_source = std::mem::replace(&mut self.source, Rc::clone(&routine.source));
        let result = self.in_scope(scope, |this| this.execute_block(&routine.decl.body));
        self.source = saved_source;
        result?;

        let returned = match self.interrupt.take() {
            Some(Interrupt::Return) => self.returned.take(),
            _ => None,
        };
        Ok(returned.unwrap_or_default())
    }

    fn eval_assign(&mut self, target: &AssignTarget, op: AssignOp, value: &Expr) -> Result<Outcome> {
        match target {
            AssignTarget::Key(key) => {
                let value = self.eval(value, true)?;
                let result = match op.binary() {
                    None => value,
                    Some(binary) => {
                        let Some(current) = Scope::get(&self.scope, key) else {
                            return Ok(Err(Blame::message("Key has not been assigned yet")));
                        };
                        match ops::arithmetic(binary, &current, &value) {
                            Ok(result) => result,
                            Err(error) => return Ok(Err(error.blame)),
                        }
                    }
                };
                Scope::set(&self.scope, key, result.clone());
                Ok(Ok(result))
            }
            AssignTarget::At { target, index } => {
                let container = self.eval(target, true)?;
                let ValueKind::Stack(stack) = container.kind() else {
                    return Ok(Err(
                        Blame::message("Expected a stack").at(&self.source, target.position)
                    ));
                };
                let position = self.eval(index, true)?;
                let slot = match ops::element_index(&position) {
                    Ok(slot) => slot,
                    Err(error) => return Ok(Err(error.blame.at(&self.source, index.position))),
                };
                let value = self.eval(value, true)?;
                let index_error = || Blame::message("Index too big").at(&self.source, index.position);

                let result = match op.binary() {
                    None => value,
                    Some(binary) => {
                        let Some(current) = stack.get(slot) else {
                            return Ok(Err(index_error()));
                        };
                        match ops::arithmetic(binary, &current, &value) {
                            Ok(result) => result,
                            Err(error) => return Ok(Err(error.blame)),
                        }
                    }
                };
                if !stack.set(slot, result.clone()) {
                    return Ok(Err(index_error()));
                }
                Ok(Ok(result))
            }
            AssignTarget::Member { target, key } => {
                let record = self.eval(target, true)?;
                if !matches!(record.kind(), ValueKind::Module(_) | ValueKind::Struct(_)) {
                    return Ok(Err(Blame::message("Expected a module or a struct")
                        .at(&self.source, target.position)));
                }
                let value = self.eval(value, true)?;
                let result = match op.binary() {
                    None => value,
                    Some(binary) => {
                        let Some(current) = record.member(key) else {
                            return Ok(Err(Blame::message("Key has not been assigned yet")));
                        };
                        match ops::arithmetic(binary, &current, &value) {
                            Ok(result) => result,
                            Err(error) => return Ok(Err(error.blame)),
                        }
                    }
                };
                match record.kind() {
                    ValueKind::Module(module) => module.set(key.as_str(), result.clone()),
                    ValueKind::Struct(fields) => fields.set(key.as_str(), result.clone()),
                    _ => {}
                }
                Ok(Ok(result))
            }
        }
    }

    fn eval_match(&mut self, match_expr: &MatchExpr) -> Result<Value> {
        let subject = self.eval(&match_expr.subject, true)?;
        for case in &match_expr.cases {
            for candidate in &case.values {
                if self.eval(candidate, true)?.equals(&subject) {
                    return self.execute_case(&case.body);
                }
            }
        }
        match &match_expr.otherwise {
            Some(body) => self.execute_case(body),
            None => Ok(Value::void()),
        }
    }
}

/// How many arguments a callable value accepts; `None` when it cannot
/// be called.
fn arity_of(value: &Value) -> Option<Arity> {
    match value.kind() {
        ValueKind::Routine(routine) => Some(routine.arity()),
        ValueKind::NativeFunction(native) => Some(native.arity),
        ValueKind::BoundMethod(method) => Some(method.method.arity()),
        ValueKind::Type(value_type) => value_type.constructor_arity(),
        _ => None,
    }
}
