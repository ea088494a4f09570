use std::collections::BTreeMap;

use log::debug;
use nix::errno::Errno;

use crate::math::error::{ErrorKind, MathError, Result};
use crate::math::eval::Eval;
use crate::math::functions::{builtins, Function, FunctionBody};
use crate::math::group::Group;
use crate::math::variables::{Locals, Variable};

/// Evaluation session
///
/// Holds the variable and function tables, the local stack used to pass call arguments, and the
/// most recent error. A context is cheap to create; callers that sample an expression many times
/// can keep one around and reuse it.
#[derive(Debug, Default)]
pub struct Context {
    pub(crate) variables: BTreeMap<String, Variable>,
    pub(crate) functions: BTreeMap<String, Function>,
    pub(crate) locals: Locals,
    pub(crate) error: MathError,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context with the native built-in functions registered
    pub fn with_builtins() -> Self {
        let mut ctx = Self::new();
        for func in builtins() {
            ctx.functions.insert(func.name.clone(), func);
        }

        ctx
    }

    /// Record `err` as the current error and hand it back for propagation
    pub fn fail(&mut self, err: MathError) -> MathError {
        debug!("error: {} (position {:?})", err, err.position);
        self.error = err;
        err
    }

    pub fn error(&self) -> &MathError {
        &self.error
    }

    pub fn clear_error(&mut self) {
        self.error = MathError::success();
    }

    /// Human readable message for the current error
    pub fn last_error(&self) -> String {
        self.error.to_string()
    }

    /// Push `value` on the local stack and return its index
    pub fn push_local(&mut self, value: f64) -> Result<usize> {
        match self.locals.push(value) {
            Some(index) => Ok(index),
            None => Err(self.fail(MathError::with_errno(ErrorKind::Memory, Errno::ENOMEM))),
        }
    }

    /// Returns false if the stack is empty
    pub fn pop_local(&mut self) -> bool {
        self.locals.pop().is_some()
    }

    /// Returns false if `index` is out of bounds
    pub fn set_local(&mut self, index: usize, value: f64) -> bool {
        self.locals.set(index, value)
    }

    pub fn local(&self, index: usize) -> Option<f64> {
        self.locals.get(index)
    }

    pub fn locals_len(&self) -> usize {
        self.locals.len()
    }

    /// Define or replace a variable, returning the previous definition
    pub fn define_variable(&mut self, name: &str, group: Group) -> Option<Variable> {
        self.variables
            .insert(name.to_string(), Variable::new(name, group))
    }

    /// Set `name` to the constant `value`, reusing the existing entry when there is one
    pub fn bind_number(&mut self, name: &str, value: f64) {
        match self.variables.get_mut(name) {
            Some(var) => var.group = Group::Number(value),
            None => {
                self.define_variable(name, Group::Number(value));
            }
        }
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn remove_variable(&mut self, name: &str) -> Option<Variable> {
        self.variables.remove(name)
    }

    /// Define or replace a function, returning the previous definition
    ///
    /// A native callback must take exactly as many arguments as the function declares.
    pub fn define_function(&mut self, func: Function) -> Result<Option<Function>> {
        if let FunctionBody::Native(native) = &func.body {
            if native.arity() != func.arity() {
                return Err(self.fail(MathError::new(ErrorKind::InvalidCall)));
            }
        }

        Ok(self.functions.insert(func.name.clone(), func))
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }

    /// Evaluate the definition of variable `name`
    pub fn compute_variable(&mut self, name: &str) -> Result<f64> {
        Eval::new(self).variable(name)
    }

    /// Call `name` with the top `arity` locals as its arguments
    ///
    /// The arguments must already be on the local stack. They are left there; popping them is
    /// up to the caller.
    pub fn call_function(&mut self, name: &str, arity: usize) -> Result<f64> {
        Eval::new(self).call(name, arity)
    }
}

#[test]
fn test_last_error() {
    let mut ctx = Context::new();
    assert_eq!(ctx.last_error(), "success");

    ctx.fail(MathError::new(ErrorKind::DoublePlusMinus));
    assert_eq!(ctx.last_error(), "a sign cannot follow another sign");

    ctx.fail(MathError::with_errno(ErrorKind::Memory, Errno::ENOMEM));
    assert_eq!(
        ctx.last_error(),
        format!("failed allocating memory: {}", Errno::ENOMEM.desc())
    );

    ctx.clear_error();
    assert_eq!(ctx.error().kind, ErrorKind::Success);
}

#[test]
fn test_locals() {
    let mut ctx = Context::new();
    assert!(!ctx.pop_local());
    assert_eq!(ctx.push_local(1.5), Ok(0));
    assert_eq!(ctx.push_local(2.5), Ok(1));
    assert!(ctx.set_local(1, 3.5));
    assert!(!ctx.set_local(2, 3.5));
    assert_eq!(ctx.local(1), Some(3.5));
    assert!(ctx.pop_local());
    assert!(ctx.pop_local());
    assert!(!ctx.pop_local());
    assert_eq!(ctx.locals_len(), 0);
}

#[test]
fn test_define_replaces() {
    let mut ctx = Context::new();
    assert!(ctx.define_variable("x", Group::Number(1.0)).is_none());
    let old = ctx.define_variable("x", Group::Number(2.0));
    assert_eq!(old.map(|v| v.group), Some(Group::Number(1.0)));
    assert_eq!(ctx.compute_variable("x"), Ok(2.0));
    assert!(ctx.remove_variable("x").is_some());
    assert!(ctx.variable("x").is_none());
}

#[test]
fn test_bind_number() {
    let mut ctx = Context::new();
    ctx.bind_number("x", 1.5);
    assert_eq!(ctx.compute_variable("x"), Ok(1.5));

    ctx.define_variable("x", Group::variable("y"));
    ctx.bind_number("x", -2.0);
    assert_eq!(ctx.variable("x").map(|v| &v.group), Some(&Group::Number(-2.0)));
    assert_eq!(ctx.variable("x").map(|v| v.name.as_str()), Some("x"));
}

#[test]
fn test_native_call() {
    let mut ctx = Context::with_builtins();
    ctx.push_local(2.0).unwrap();
    ctx.push_local(10.0).unwrap();
    assert_eq!(ctx.call_function("pow", 2), Ok(1024.0));

    // Arguments are read from the top of the stack
    assert_eq!(ctx.call_function("sqrt", 1), Ok(10.0_f64.sqrt()));

    // The caller pops
    assert_eq!(ctx.locals_len(), 2);
    assert!(ctx.pop_local());
    assert!(ctx.pop_local());
}

#[test]
fn test_invalid_calls() {
    use crate::math::functions::Native;

    let mut ctx = Context::with_builtins();
    let err = ctx.call_function("nope", 0).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidCall);

    ctx.push_local(1.0).unwrap();
    let err = ctx.call_function("pow", 2).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidCall);
    assert_eq!(ctx.call_function("sin", 2).unwrap_err().kind, ErrorKind::InvalidCall);
    assert_eq!(ctx.last_error(), "the call is invalid");

    let bad = Function::native("bad", &["x", "y"], Native::Unary(Box::new(|x: f64| x)));
    assert_eq!(
        ctx.define_function(bad).unwrap_err().kind,
        ErrorKind::InvalidCall
    );
    assert!(ctx.function("bad").is_none());
}
