use std::collections::BTreeMap;

use log::debug;
use nix::errno::Errno;

use crate::math::context::Context;
use crate::math::error::{ErrorKind, MathError, Result};
use crate::math::functions::{Function, FunctionBody};
use crate::math::group::{BinaryOperator, Group};
use crate::math::variables::{Locals, Variable};

/// Deepest nesting of variable references and user function calls
pub const MAX_DEPTH: usize = 256;

/// Unit of pending work
///
/// Evaluation runs off an explicit work list instead of the native stack, so a tree of any
/// depth can be evaluated.
enum Step<'a> {
    Visit(&'a Group),
    Negate,
    Apply(BinaryOperator),
    /// Move `n` evaluated arguments onto the local stack and call the function
    Call(&'a str, usize),
    /// Done with a variable definition
    Leave,
    /// Done with a user function body
    Return,
    /// Pop call arguments down to the given stack length
    Release(usize),
}

/// Tree evaluator over split borrows of a `Context`
pub(crate) struct Eval<'a> {
    variables: &'a BTreeMap<String, Variable>,
    functions: &'a BTreeMap<String, Function>,
    locals: &'a mut Locals,
    error: &'a mut MathError,
    steps: Vec<Step<'a>>,
    values: Vec<f64>,
    depth: usize,
    base_locals: usize,
    base_frames: usize,
}

impl<'a> Eval<'a> {
    pub(crate) fn new(ctx: &'a mut Context) -> Self {
        let Context {
            variables,
            functions,
            locals,
            error,
        } = ctx;
        let base_locals = locals.len();
        let base_frames = locals.depth();

        Self {
            variables,
            functions,
            locals,
            error,
            steps: Vec::new(),
            values: Vec::new(),
            depth: 0,
            base_locals,
            base_frames,
        }
    }

    fn record(&mut self, err: MathError) -> MathError {
        debug!("evaluation failed: {}", err);
        *self.error = err;
        err
    }

    fn fail(&mut self, kind: ErrorKind) -> MathError {
        self.record(MathError::new(kind))
    }

    fn out_of_memory(&mut self) -> MathError {
        self.record(MathError::with_errno(ErrorKind::Memory, Errno::ENOMEM))
    }

    pub(crate) fn evaluate(mut self, group: &'a Group) -> Result<f64> {
        self.steps.push(Step::Visit(group));
        self.run()
    }

    pub(crate) fn variable(mut self, name: &str) -> Result<f64> {
        self.enter_variable(name)?;
        self.run()
    }

    /// Call `name` on the top `arity` locals, which stay on the stack afterwards
    pub(crate) fn call(mut self, name: &str, arity: usize) -> Result<f64> {
        self.invoke(name, arity)?;
        self.run()
    }

    fn run(&mut self) -> Result<f64> {
        match self.drive() {
            Ok(value) => Ok(value),
            Err(err) => {
                // Unwind whatever the failed call chain left on the stack
                self.locals.truncate(self.base_locals);
                self.locals.truncate_frames(self.base_frames);
                Err(err)
            }
        }
    }

    fn drive(&mut self) -> Result<f64> {
        while let Some(step) = self.steps.pop() {
            match step {
                Step::Visit(group) => self.visit(group)?,
                Step::Negate => {
                    let value = self.operand()?;
                    self.values.push(-value);
                }
                Step::Apply(op) => {
                    let rhs = self.operand()?;
                    let lhs = self.operand()?;
                    let value = match op {
                        BinaryOperator::Add => lhs + rhs,
                        BinaryOperator::Subtract => lhs - rhs,
                        BinaryOperator::Multiply => lhs * rhs,
                        BinaryOperator::Divide => lhs / rhs,
                        BinaryOperator::Mod
                        | BinaryOperator::And
                        | BinaryOperator::Or
                        | BinaryOperator::Xor => return Err(self.fail(ErrorKind::Unsupported)),
                    };
                    self.values.push(value);
                }
                Step::Call(name, count) => {
                    let mark = self.locals.len();
                    let base = self.values.len().saturating_sub(count);
                    for i in base..self.values.len() {
                        if self.locals.push(self.values[i]).is_none() {
                            return Err(self.out_of_memory());
                        }
                    }
                    self.values.truncate(base);
                    self.steps.push(Step::Release(mark));
                    self.invoke(name, count)?;
                }
                Step::Leave => self.depth -= 1,
                Step::Return => {
                    self.locals.pop_frame();
                    self.depth -= 1;
                }
                Step::Release(mark) => self.locals.truncate(mark),
            }
        }

        self.operand()
    }

    fn visit(&mut self, group: &'a Group) -> Result<()> {
        match group {
            Group::Number(n) => self.values.push(*n),
            Group::Negate(inner) => {
                self.steps.push(Step::Negate);
                self.steps.push(Step::Visit(&**inner));
            }
            Group::BinaryOp(op, lhs, rhs) => {
                self.steps.push(Step::Apply(*op));
                self.steps.push(Step::Visit(&**rhs));
                self.steps.push(Step::Visit(&**lhs));
            }
            Group::FunctionCall(name, args) => {
                self.steps.push(Step::Call(name.as_str(), args.len()));
                for arg in args.iter().rev() {
                    self.steps.push(Step::Visit(arg));
                }
            }
            Group::Variable(name) => self.enter_variable(name)?,
            Group::Local(index) => match self.locals.argument(*index) {
                Some(value) => self.values.push(value),
                None => return Err(self.fail(ErrorKind::InvalidCall)),
            },
        }

        Ok(())
    }

    fn operand(&mut self) -> Result<f64> {
        match self.values.pop() {
            Some(value) => Ok(value),
            None => Err(self.fail(ErrorKind::EmptyExpression)),
        }
    }

    fn enter(&mut self) -> Result<()> {
        if self.depth >= MAX_DEPTH {
            return Err(self.fail(ErrorKind::InvalidCall));
        }

        self.depth += 1;
        Ok(())
    }

    fn enter_variable(&mut self, name: &str) -> Result<()> {
        let variables = self.variables;
        let var = match variables.get(name) {
            Some(var) => var,
            None => return Err(self.fail(ErrorKind::InvalidCall)),
        };

        self.enter()?;
        self.steps.push(Step::Leave);
        self.steps.push(Step::Visit(&var.group));
        Ok(())
    }

    fn invoke(&mut self, name: &str, count: usize) -> Result<()> {
        let functions = self.functions;
        let func = match functions.get(name) {
            Some(func) if func.arity() == count && self.locals.len() >= count => func,
            _ => return Err(self.fail(ErrorKind::InvalidCall)),
        };

        match &func.body {
            FunctionBody::Native(native) => {
                let value = self.locals.top(count).and_then(|args| native.call(args));
                match value {
                    Some(value) => self.values.push(value),
                    None => return Err(self.fail(ErrorKind::InvalidCall)),
                }
            }
            FunctionBody::Group(body) => {
                self.enter()?;
                self.locals.push_frame(count);
                self.steps.push(Step::Return);
                self.steps.push(Step::Visit(body));
            }
        }

        Ok(())
    }
}

/// Compute the value of `group`
///
/// Resets the error slot of `ctx` first. Division by zero is not an error and follows IEEE 754
/// (`inf` or `NaN`).
pub fn evaluate(ctx: &mut Context, group: &Group) -> Result<f64> {
    ctx.clear_error();
    let value = Eval::new(ctx).evaluate(group)?;
    debug!("evaluated tree of {} nodes to {}", group.node_count(), value);
    Ok(value)
}

#[cfg(test)]
fn num(n: f64) -> Group {
    Group::Number(n)
}

#[cfg(test)]
fn bin(op: BinaryOperator, lhs: Group, rhs: Group) -> Group {
    Group::binary(op, lhs, rhs)
}

#[test]
fn test_arithmetic() {
    use BinaryOperator::*;

    let data = vec![
        (num(3.5), 3.5),
        (bin(Add, num(3.0), bin(Multiply, num(7.0), num(5.0))), 38.0),
        (bin(Multiply, bin(Add, num(3.0), num(10.0)), num(2.0)), 26.0),
        (bin(Subtract, bin(Subtract, num(10.0), num(3.0)), num(2.0)), 5.0),
        (bin(Divide, num(1.0), num(4.0)), 0.25),
        (Group::negate(Group::negate(num(2.0))), 2.0),
    ];

    for (group, expected) in data {
        let mut ctx = Context::new();
        assert_eq!(evaluate(&mut ctx, &group), Ok(expected), "{}", group);
        assert_eq!(ctx.error().kind, ErrorKind::Success);
    }
}

#[test]
fn test_nested_signs() {
    use BinaryOperator::*;

    // -(-3.1) * -(7 * (3 - 2) + 5)
    let group = bin(
        Multiply,
        Group::negate(Group::negate(num(3.1))),
        Group::negate(bin(
            Add,
            bin(Multiply, num(7.0), bin(Subtract, num(3.0), num(2.0))),
            num(5.0),
        )),
    );

    let mut ctx = Context::new();
    let value = evaluate(&mut ctx, &group).unwrap();
    assert!((value - -37.2).abs() < 1e-9);

    // Evaluating twice gives the same answer
    assert_eq!(evaluate(&mut ctx, &group), Ok(value));
}

#[test]
fn test_division_by_zero() {
    let mut ctx = Context::new();
    let inf = bin(BinaryOperator::Divide, num(1.0), num(0.0));
    assert_eq!(evaluate(&mut ctx, &inf), Ok(f64::INFINITY));

    let nan = bin(BinaryOperator::Divide, num(0.0), num(0.0));
    assert!(evaluate(&mut ctx, &nan).unwrap().is_nan());
}

#[test]
fn test_unsupported() {
    for op in &[
        BinaryOperator::Mod,
        BinaryOperator::And,
        BinaryOperator::Or,
        BinaryOperator::Xor,
    ] {
        let mut ctx = Context::new();
        let err = evaluate(&mut ctx, &bin(*op, num(1.0), num(2.0))).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unsupported);
        assert_eq!(ctx.last_error(), "the operation is not supported");
    }
}

#[test]
fn test_variables() {
    let mut ctx = Context::new();
    ctx.define_variable("x", num(4.0));
    ctx.define_variable(
        "y",
        bin(BinaryOperator::Multiply, Group::variable("x"), num(2.0)),
    );
    assert_eq!(evaluate(&mut ctx, &Group::variable("y")), Ok(8.0));

    // References are resolved on every evaluation
    ctx.define_variable("x", num(1.0));
    assert_eq!(evaluate(&mut ctx, &Group::variable("y")), Ok(2.0));

    let err = evaluate(&mut ctx, &Group::variable("z")).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidCall);
}

#[test]
fn test_self_reference() {
    let mut ctx = Context::new();
    ctx.define_variable(
        "x",
        bin(BinaryOperator::Add, Group::variable("x"), num(1.0)),
    );
    let err = evaluate(&mut ctx, &Group::variable("x")).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidCall);
}

#[test]
fn test_function_calls() {
    let mut ctx = Context::with_builtins();
    let square = bin(BinaryOperator::Multiply, Group::Local(0), Group::Local(0));
    ctx.define_function(Function::user("square", &["x"], square))
        .unwrap();
    let diff = bin(BinaryOperator::Subtract, Group::Local(0), Group::Local(1));
    ctx.define_function(Function::user("diff", &["a", "b"], diff))
        .unwrap();

    let data = vec![
        (Group::call("square", vec![num(3.0)]), 9.0),
        (Group::call("diff", vec![num(10.0), num(4.0)]), 6.0),
        (
            Group::call(
                "diff",
                vec![Group::call("square", vec![num(5.0)]), num(1.0)],
            ),
            24.0,
        ),
        (
            Group::call("square", vec![Group::call("pow", vec![num(2.0), num(3.0)])]),
            64.0,
        ),
        (Group::call("floor", vec![num(2.7)]), 2.0),
    ];

    for (group, expected) in data {
        assert_eq!(evaluate(&mut ctx, &group), Ok(expected), "{}", group);
        assert_eq!(ctx.locals_len(), 0);
    }
}

#[test]
fn test_invalid_calls_release_locals() {
    let mut ctx = Context::with_builtins();
    let body = Group::call("nope", vec![Group::Local(0)]);
    ctx.define_function(Function::user("broken", &["x"], body))
        .unwrap();

    let data = vec![
        Group::call("nope", vec![]),
        Group::call("sin", vec![num(1.0), num(2.0)]),
        Group::call("broken", vec![num(1.0)]),
        Group::Local(0),
    ];

    for group in data {
        let err = evaluate(&mut ctx, &group).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidCall, "{}", group);
        assert_eq!(ctx.locals_len(), 0);
        assert_eq!(ctx.locals.depth(), 0);
    }
}

#[test]
fn test_runaway_recursion() {
    let mut ctx = Context::new();
    let body = Group::call("forever", vec![Group::Local(0)]);
    ctx.define_function(Function::user("forever", &["x"], body))
        .unwrap();

    let err = evaluate(&mut ctx, &Group::call("forever", vec![num(1.0)])).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidCall);
    assert_eq!(ctx.locals_len(), 0);
}

#[test]
fn test_deep_tree() {
    let mut tree = num(0.0);
    for _ in 0..100_000 {
        tree = bin(BinaryOperator::Add, tree, num(1.0));
    }

    let mut ctx = Context::new();
    assert_eq!(evaluate(&mut ctx, &tree), Ok(100_000.0));
}
