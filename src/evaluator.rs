use crate::ast::{
    BinaryOp, ClassDecl, Expr, FunctionBody, FunctionDecl, Literal, Program, Segment, Stmt,
    UnaryOp, VariableDecl,
};
use crate::builtins::{self, BuiltinContext};
use crate::environment::{parse_lifetime, Binding, Environment};
use crate::error::{InterpretationError, RuntimeError, RuntimeFault, Span};
use crate::host::{Clock, Coin, RandomCoin, SystemClock};
use crate::operators;
use crate::value::{Instance, Value};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::time::SystemTime;
use tracing::{debug, instrument};

struct Export {
    name: String,
    target_file: String,
    value: Value,
}

/// Walks a parsed program. One evaluator owns every piece of runtime state, so
/// a REPL can keep one alive across inputs and `reset` it for a fresh run.
pub struct Evaluator {
    environment: Environment,
    classes: HashMap<String, Rc<ClassDecl>>,
    instances: HashMap<String, Rc<Instance>>,
    poisoned: Vec<f64>,
    reversed: bool,
    output: Vec<String>,
    echo: bool,
    exports: Vec<Export>,
    current_file: Option<String>,
    clock: Box<dyn Clock>,
    coin: Box<dyn Coin>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        let mut environment = Environment::new();
        builtins::install(&mut environment);

        Self {
            environment,
            classes: HashMap::new(),
            instances: HashMap::new(),
            poisoned: Vec::new(),
            reversed: false,
            output: Vec::new(),
            echo: false,
            exports: Vec::new(),
            current_file: None,
            clock: Box::new(SystemClock),
            coin: Box::new(RandomCoin::new()),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_coin(mut self, coin: impl Coin + 'static) -> Self {
        self.coin = Box::new(coin);
        self
    }

    /// Also write every emitted line to stdout as it happens.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Forgets everything a previous run left behind. Clock, coin and echo stay.
    pub fn reset(&mut self) {
        self.environment = Environment::new();
        builtins::install(&mut self.environment);
        self.classes.clear();
        self.instances.clear();
        self.poisoned.clear();
        self.reversed = false;
        self.output.clear();
        self.exports.clear();
        self.current_file = None;
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    pub fn get_variable(&mut self, name: &str) -> Option<Value> {
        let now = self.clock.now();
        self.environment.lookup(name, now).ok()
    }

    /// Runs a program and returns the value of the last statement executed.
    /// On failure the error carries every line this run emitted before it.
    pub fn interpret(&mut self, program: &Program) -> Result<Value, InterpretationError> {
        let emitted_before = self.output.len();

        self.execute_program(program).map_err(|error| {
            InterpretationError::new(error, self.output[emitted_before..].to_vec())
        })
    }

    #[instrument(level = "debug", skip_all, fields(statements = program.statements.len()))]
    fn execute_program(&mut self, program: &Program) -> Result<Value, RuntimeError> {
        let reverse_statements = program
            .statements
            .iter()
            .filter(|statement| matches!(statement, Stmt::Reverse { .. }))
            .count();
        let backwards = self.reversed ^ (reverse_statements % 2 == 1);
        debug!(backwards, "executing program");

        let mut result = Value::Undefined;
        if backwards {
            for statement in program.statements.iter().rev() {
                result = self.execute_statement(statement)?;
            }
        } else {
            for statement in &program.statements {
                result = self.execute_statement(statement)?;
            }
        }
        Ok(result)
    }

    fn emit(&mut self, line: String) {
        if self.echo {
            println!("{}", line);
        }
        self.output.push(line);
    }

    fn emit_debug(&mut self, value: &Value) {
        self.emit(format!("DEBUG: {} (type: {})", value, value.type_name()));
    }

    fn is_truthy(&mut self, value: &Value) -> bool {
        match value.definite_truth() {
            Some(truth) => truth,
            None => self.coin.flip(),
        }
    }

    fn now(&self) -> SystemTime {
        self.clock.now()
    }

    /// Runs `body` one scope deeper; the scope is popped on success and failure alike.
    fn with_scope<T>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<T, RuntimeError>,
    ) -> Result<T, RuntimeError> {
        self.environment.push_scope();
        let result = body(self);
        self.environment.pop_scope();
        result
    }

    fn execute_sequence(&mut self, statements: &[Stmt]) -> Result<Value, RuntimeError> {
        let mut result = Value::Undefined;
        for statement in statements {
            result = self.execute_statement(statement)?;
        }
        Ok(result)
    }

    fn execute_statement(&mut self, stmt: &Stmt) -> Result<Value, RuntimeError> {
        match stmt {
            Stmt::Expression { expr, debug, .. } => {
                let value = self.evaluate_expression(expr)?;
                if *debug {
                    self.emit_debug(&value);
                }
                Ok(value)
            }
            Stmt::Assignment {
                target,
                value,
                debug,
                ..
            } => {
                let value = self.evaluate_expression(value)?;
                self.assign_to(target, value.clone())?;
                if *debug {
                    self.emit_debug(&value);
                }
                Ok(value)
            }
            Stmt::VariableDeclaration(decl) => self.declare_variable(decl),
            Stmt::GlobalConstant { name, value, .. } => {
                let value = self.evaluate_expression(value)?;
                self.environment.define_global_constant(name, value);
                Ok(Value::Undefined)
            }
            Stmt::Function(decl) => {
                self.environment
                    .define(&decl.name, Binding::new(Value::Function(Rc::clone(decl))));
                Ok(Value::Undefined)
            }
            Stmt::Class(decl) => {
                self.classes.insert(decl.name.clone(), Rc::clone(decl));
                Ok(Value::Undefined)
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                let condition_value = self.evaluate_expression(condition)?;
                if self.is_truthy(&condition_value) {
                    self.execute_sequence(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute_sequence(else_branch)
                } else {
                    Ok(Value::Undefined)
                }
            }
            Stmt::When { condition, body, .. } => {
                let condition_value = self.evaluate_expression(condition)?;
                if self.is_truthy(&condition_value) {
                    self.execute_sequence(body)
                } else {
                    Ok(Value::Undefined)
                }
            }
            Stmt::Return { value, .. } => match value {
                Some(expr) => self.evaluate_expression(expr),
                None => Ok(Value::Undefined),
            },
            Stmt::Delete { target, span } => {
                self.delete(target, *span)?;
                Ok(Value::Undefined)
            }
            Stmt::Import { name, span } => {
                let value = self
                    .find_export(name)
                    .ok_or_else(|| RuntimeFault::MissingExport(name.clone()).at(*span))?;
                self.environment.define(name, Binding::new(value));
                Ok(Value::Undefined)
            }
            Stmt::Export {
                name,
                target_file,
                span,
            } => {
                let now = self.now();
                let value = self
                    .environment
                    .lookup(name, now)
                    .map_err(|fault| fault.at(*span))?;
                self.exports.push(Export {
                    name: name.clone(),
                    target_file: target_file.clone(),
                    value,
                });
                Ok(Value::Undefined)
            }
            Stmt::Reverse { .. } => {
                self.reversed = !self.reversed;
                debug!(reversed = self.reversed, "toggled reverse");
                Ok(Value::Undefined)
            }
            Stmt::FileBlock { name, body, .. } => {
                let enclosing_file = std::mem::replace(&mut self.current_file, name.clone());
                debug!(file = name.as_deref().unwrap_or("<anonymous>"), "entering file block");
                let result = self.with_scope(|evaluator| evaluator.execute_sequence(body));
                self.current_file = enclosing_file;
                result
            }
            Stmt::Noop { .. } => Ok(Value::Undefined),
        }
    }

    fn declare_variable(&mut self, decl: &VariableDecl) -> Result<Value, RuntimeError> {
        let now = self.now();

        if let Ok(existing) = self.environment.resolve(&decl.name, now) {
            if decl.priority < existing.priority {
                debug!(
                    name = %decl.name,
                    priority = decl.priority,
                    existing = existing.priority,
                    "ignored lower priority redeclaration"
                );
                return Ok(Value::Undefined);
            }
        }

        let value = match &decl.value {
            Some(expr) => self.evaluate_expression(expr)?,
            None => Value::Undefined,
        };
        let expires_at = decl
            .lifetime
            .as_deref()
            .and_then(|lifetime| parse_lifetime(lifetime, now));

        debug!(
            name = %decl.name,
            const_count = decl.const_count,
            var_count = decl.var_count,
            type_annotation = decl.type_annotation.as_deref().unwrap_or("-"),
            priority = decl.priority,
            "declared variable"
        );

        if decl.debug {
            self.emit_debug(&value);
        }
        self.environment.define(
            &decl.name,
            Binding::new(value)
                .with_priority(decl.priority)
                .with_expiry(expires_at),
        );
        Ok(Value::Undefined)
    }

    fn assign_to(&mut self, target: &Expr, value: Value) -> Result<(), RuntimeError> {
        match target {
            Expr::Identifier { name, span } => {
                let now = self.now();
                self.environment
                    .assign(name, value, now)
                    .map_err(|fault| fault.at(*span))
            }
            Expr::Index { array, index, span } => {
                let array_value = self.evaluate_expression(array)?;
                let index_value = self.evaluate_expression(index)?;

                let Value::Array(cells) = array_value else {
                    return Err(RuntimeFault::NotIndexable(array_value.type_name()).at(*span));
                };
                let out_of_range = || RuntimeFault::IndexOutOfRange(index_value.to_string()).at(*span);
                let mut cells = cells.borrow_mut();

                match index_value {
                    // A fractional index squeezes a new element in
                    Value::Float(position) => {
                        let slot = position.trunc() + 1.0;
                        if !(0.0..=cells.len() as f64).contains(&slot) {
                            return Err(out_of_range());
                        }
                        cells.insert(slot as usize, value);
                    }
                    _ => {
                        let slot = storage_slot(&index_value, cells.len()).ok_or_else(out_of_range)?;
                        cells[slot] = value;
                    }
                }
                Ok(())
            }
            Expr::Member {
                object,
                property,
                span,
            } => match self.evaluate_expression(object)? {
                Value::Instance(instance) => {
                    instance.fields.borrow_mut().insert(property.clone(), value);
                    Ok(())
                }
                _ => Err(RuntimeFault::InvalidAssignmentTarget.at(*span)),
            },
            other => Err(RuntimeFault::InvalidAssignmentTarget.at(other.span())),
        }
    }

    fn delete(&mut self, target: &Expr, span: Span) -> Result<(), RuntimeError> {
        match target {
            Expr::Identifier { name, .. } => {
                let now = self.now();
                if !self.environment.delete(name, now) {
                    debug!(name = %name, "delete of unbound name ignored");
                }
                Ok(())
            }
            Expr::Literal { .. } => {
                let value = self.evaluate_expression(target)?;
                match value.as_number() {
                    Some(number) => {
                        debug!(%value, "poisoned number");
                        self.poisoned.push(number);
                    }
                    None => debug!(%value, "delete of non-numeric literal ignored"),
                }
                Ok(())
            }
            _ => Err(RuntimeFault::InvalidAssignmentTarget.at(span)),
        }
    }

    fn find_export(&self, name: &str) -> Option<Value> {
        let addressed_here = self.exports.iter().rev().find(|export| {
            export.name == name && Some(export.target_file.as_str()) == self.current_file.as_deref()
        });

        addressed_here
            .or_else(|| self.exports.iter().rev().find(|export| export.name == name))
            .map(|export| export.value.clone())
    }

    fn check_poison(&self, value: &Value, span: Span) -> Result<(), RuntimeError> {
        match value.as_number() {
            Some(number) if self.poisoned.contains(&number) => {
                Err(RuntimeFault::PoisonedArithmetic(value.to_string()).at(span))
            }
            _ => Ok(()),
        }
    }

    pub fn evaluate_expression(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Literal { value, .. } => Ok(match value {
                Literal::Int(n) => Value::Int(*n),
                Literal::Float(n) => Value::Float(*n),
                Literal::Fraction(text) => operators::fraction(text),
                Literal::Str(s) => Value::Str(s.clone()),
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Maybe => Value::Maybe,
                Literal::Undefined => Value::Undefined,
                Literal::Null => Value::Null,
            }),
            Expr::Identifier { name, span } => {
                let now = self.now();
                self.environment
                    .lookup(name, now)
                    .map_err(|fault| fault.at(*span))
            }
            Expr::Array { elements, .. } => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.evaluate_expression(element)?);
                }
                Ok(Value::array(values))
            }
            Expr::Index { array, index, span } => {
                let array_value = self.evaluate_expression(array)?;
                let index_value = self.evaluate_expression(index)?;

                match array_value {
                    Value::Array(cells) => {
                        let element = {
                            let cells = cells.borrow();
                            storage_slot(&index_value, cells.len()).map(|slot| cells[slot].clone())
                        };
                        element.ok_or_else(|| {
                            RuntimeFault::IndexOutOfRange(index_value.to_string()).at(*span)
                        })
                    }
                    other => Err(RuntimeFault::NotIndexable(other.type_name()).at(*span)),
                }
            }
            Expr::Binary {
                left,
                operator,
                right,
                span,
            } => self.evaluate_binary(left, *operator, right, *span),
            Expr::Unary {
                operator,
                operand,
                span,
            } => {
                let value = self.evaluate_expression(operand)?;
                match operator {
                    UnaryOp::Not => Ok(Value::Bool(!self.is_truthy(&value))),
                    _ => operators::unary(*operator, &value).map_err(|fault| fault.at(*span)),
                }
            }
            Expr::Step {
                target,
                direction,
                prefix,
                span,
            } => {
                let Expr::Identifier { name, .. } = target.as_ref() else {
                    return Err(RuntimeFault::InvalidAssignmentTarget.at(*span));
                };
                let now = self.now();
                let current = self
                    .environment
                    .lookup(name, now)
                    .map_err(|fault| fault.at(*span))?;
                let stepped = operators::step(&current, *direction).map_err(|fault| fault.at(*span))?;
                self.environment
                    .assign(name, stepped.clone(), now)
                    .map_err(|fault| fault.at(*span))?;

                Ok(if *prefix { stepped } else { current })
            }
            Expr::Call { callee, args, span } => {
                let callee_value = match callee.as_ref() {
                    Expr::Identifier { name, .. } => {
                        let now = self.now();
                        self.environment.lookup(name, now).map_err(|fault| {
                            match fault {
                                RuntimeFault::UndefinedVariable(name) => {
                                    RuntimeFault::UndefinedFunction(name)
                                }
                                other => other,
                            }
                            .at(*span)
                        })?
                    }
                    other => self.evaluate_expression(other)?,
                };

                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(self.evaluate_expression(arg)?);
                }

                self.call_value(callee_value, arg_values, *span)
            }
            Expr::Member {
                object,
                property,
                span,
            } => match self.evaluate_expression(object)? {
                Value::Instance(instance) => {
                    let field = instance.fields.borrow().get(property).cloned();
                    field.ok_or_else(|| RuntimeFault::MissingMember(property.clone()).at(*span))
                }
                Value::Record(record) => record.member(property).map_err(|fault| fault.at(*span)),
                _ => Err(RuntimeFault::MissingMember(property.clone()).at(*span)),
            },
            Expr::Previous { target, span } => match target.as_ref() {
                Expr::Identifier { name, .. } => {
                    let now = self.now();
                    self.environment
                        .resolve(name, now)
                        .map(|binding| binding.previous())
                        .map_err(|fault| fault.at(*span))
                }
                _ => Err(RuntimeFault::InvalidTemporalTarget("previous").at(*span)),
            },
            Expr::Next { span, .. } => Err(RuntimeFault::UnimplementedOperator("next").at(*span)),
            Expr::Current { target, .. } => self.evaluate_expression(target),
            Expr::Use { initial, .. } => {
                let initial = self.evaluate_expression(initial)?;
                Ok(Value::Signal(Rc::new(RefCell::new(initial))))
            }
            Expr::New {
                class_name, span, ..
            } => self.instantiate(class_name, *span),
            Expr::Await { expr, .. } => self.evaluate_expression(expr),
            Expr::Interpolation { segments, .. } => {
                let mut rendered = String::new();
                for segment in segments {
                    match segment {
                        Segment::Text(text) => rendered.push_str(text),
                        Segment::Expr { expr, .. } => {
                            let value = self.evaluate_expression(expr)?;
                            rendered.push_str(&value.to_string());
                        }
                    }
                }
                Ok(Value::Str(rendered))
            }
        }
    }

    fn evaluate_binary(
        &mut self,
        left: &Expr,
        operator: BinaryOp,
        right: &Expr,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        let left_value = self.evaluate_expression(left)?;

        match operator {
            BinaryOp::And => {
                if self.is_truthy(&left_value) {
                    self.evaluate_expression(right)
                } else {
                    Ok(left_value)
                }
            }
            BinaryOp::Or => {
                if self.is_truthy(&left_value) {
                    Ok(left_value)
                } else {
                    self.evaluate_expression(right)
                }
            }
            BinaryOp::Add
            | BinaryOp::Subtract
            | BinaryOp::Multiply
            | BinaryOp::Divide
            | BinaryOp::Power
            | BinaryOp::Modulo => {
                let right_value = self.evaluate_expression(right)?;
                self.check_poison(&left_value, span)?;
                self.check_poison(&right_value, span)?;
                operators::arithmetic(operator, &left_value, &right_value)
                    .map_err(|fault| fault.at(span))
            }
            _ => {
                let right_value = self.evaluate_expression(right)?;
                operators::compare(operator, &left_value, &right_value)
                    .map(Value::Bool)
                    .map_err(|fault| fault.at(span))
            }
        }
    }

    fn call_value(&mut self, callee: Value, args: Vec<Value>, span: Span) -> Result<Value, RuntimeError> {
        match callee {
            Value::Function(decl) => self.call_function(&decl, args),
            Value::Builtin(builtin) => builtin.call(&args, self).map_err(|fault| fault.at(span)),
            Value::Signal(cell) => match args.into_iter().next() {
                Some(new_value) => {
                    *cell.borrow_mut() = new_value.clone();
                    Ok(new_value)
                }
                None => {
                    let current = cell.borrow().clone();
                    Ok(current)
                }
            },
            other => Err(RuntimeFault::NotCallable(other.type_name()).at(span)),
        }
    }

    #[instrument(level = "debug", skip_all, fields(function = %decl.name, args = args.len()))]
    fn call_function(&mut self, decl: &FunctionDecl, args: Vec<Value>) -> Result<Value, RuntimeError> {
        self.with_scope(|evaluator| {
            let mut args = args.into_iter();
            for parameter in &decl.parameters {
                let value = args.next().unwrap_or(Value::Undefined);
                evaluator.environment.define(parameter, Binding::new(value));
            }

            match &decl.body {
                FunctionBody::Expression(expr) => evaluator.evaluate_expression(expr),
                FunctionBody::Block(statements) => {
                    let mut result = Value::Undefined;
                    for statement in statements {
                        result = evaluator.execute_statement(statement)?;
                        if matches!(statement, Stmt::Return { .. }) {
                            break;
                        }
                    }
                    Ok(result)
                }
            }
        })
    }

    fn instantiate(&mut self, class_name: &str, span: Span) -> Result<Value, RuntimeError> {
        let decl = self
            .classes
            .get(class_name)
            .cloned()
            .ok_or_else(|| RuntimeFault::UndefinedClass(class_name.to_string()).at(span))?;

        if self.instances.contains_key(class_name) {
            return Err(RuntimeFault::DuplicateInstance(class_name.to_string()).at(span));
        }

        self.environment.push_scope();
        let result = self.execute_sequence(&decl.body);
        let scope = self.environment.pop_scope().unwrap_or_default();
        result?;

        let fields: BTreeMap<String, Value> = scope
            .into_iter()
            .filter(|(_, binding)| !binding.deleted)
            .map(|(name, binding)| (name, binding.value))
            .collect();
        debug!(class = class_name, fields = fields.len(), "instantiated class");

        let instance = Rc::new(Instance {
            class_name: class_name.to_string(),
            fields: RefCell::new(fields),
        });
        self.instances
            .insert(class_name.to_string(), Rc::clone(&instance));
        Ok(Value::Instance(instance))
    }
}

impl BuiltinContext for Evaluator {
    fn emit(&mut self, line: String) {
        Evaluator::emit(self, line);
    }

    fn now(&self) -> SystemTime {
        self.clock.now()
    }
}

/// Maps a source index onto storage: `-1` is the first element, `0` the second.
/// Fractional indices read the element at their integer part.
fn storage_slot(index: &Value, len: usize) -> Option<usize> {
    let index = match index {
        Value::Int(n) => *n,
        Value::Float(n) if n.is_finite() => n.trunc() as i64,
        Value::Bool(b) => i64::from(*b),
        _ => return None,
    };

    let slot = index.checked_add(1)?;
    usize::try_from(slot).ok().filter(|slot| *slot < len)
}
