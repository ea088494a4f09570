use std::fmt;

use crate::math::group::Group;

/// Native callback, shaped by arity
pub enum Native {
    Nullary(Box<dyn Fn() -> f64>),
    Unary(Box<dyn Fn(f64) -> f64>),
    Binary(Box<dyn Fn(f64, f64) -> f64>),
    Ternary(Box<dyn Fn(f64, f64, f64) -> f64>),
}

impl Native {
    pub fn arity(&self) -> usize {
        match self {
            Native::Nullary(_) => 0,
            Native::Unary(_) => 1,
            Native::Binary(_) => 2,
            Native::Ternary(_) => 3,
        }
    }

    /// Returns `None` if `args` does not match the arity
    pub fn call(&self, args: &[f64]) -> Option<f64> {
        Some(match (self, args) {
            (Native::Nullary(f), []) => f(),
            (Native::Unary(f), [a]) => f(*a),
            (Native::Binary(f), [a, b]) => f(*a, *b),
            (Native::Ternary(f), [a, b, c]) => f(*a, *b, *c),
            _ => return None,
        })
    }
}

impl fmt::Debug for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Native(arity {})", self.arity())
    }
}

#[derive(Debug)]
pub enum FunctionBody {
    /// User defined, parameters are read through `Group::Local`
    Group(Group),
    Native(Native),
}

#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub parameters: Vec<String>,
    pub body: FunctionBody,
}

impl Function {
    pub fn user(name: &str, parameters: &[&str], body: Group) -> Self {
        Self {
            name: name.to_string(),
            parameters: parameters.iter().map(|p| p.to_string()).collect(),
            body: FunctionBody::Group(body),
        }
    }

    pub fn native(name: &str, parameters: &[&str], native: Native) -> Self {
        Self {
            name: name.to_string(),
            parameters: parameters.iter().map(|p| p.to_string()).collect(),
            body: FunctionBody::Native(native),
        }
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_native(&self) -> bool {
        matches!(self.body, FunctionBody::Native(_))
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.parameters.join(", "))
    }
}

fn unary(name: &str, f: fn(f64) -> f64) -> Function {
    Function::native(name, &["x"], Native::Unary(Box::new(f)))
}

/// Functions every fresh context knows about
///
/// `erfc` and `gamma` are keywords too but std has no stable `f64` implementation for them, so
/// they are left out.
pub fn builtins() -> Vec<Function> {
    vec![
        unary("floor", f64::floor),
        unary("ceil", f64::ceil),
        unary("exp", f64::exp),
        unary("sqrt", f64::sqrt),
        unary("cbrt", f64::cbrt),
        unary("ln", f64::ln),
        unary("log10", f64::log10),
        unary("sin", f64::sin),
        unary("cos", f64::cos),
        unary("tan", f64::tan),
        unary("cot", |x| 1.0 / x.tan()),
        unary("sec", |x| 1.0 / x.cos()),
        unary("csc", |x| 1.0 / x.sin()),
        unary("sinh", f64::sinh),
        unary("cosh", f64::cosh),
        unary("tanh", f64::tanh),
        unary("asinh", f64::asinh),
        unary("acosh", f64::acosh),
        unary("atanh", f64::atanh),
        Function::native("pow", &["x", "y"], Native::Binary(Box::new(f64::powf))),
        Function::native(
            "root",
            &["x", "n"],
            Native::Binary(Box::new(|x: f64, n: f64| x.powf(1.0 / n))),
        ),
        Function::native(
            "log",
            &["x", "base"],
            Native::Binary(Box::new(|x: f64, base: f64| x.log(base))),
        ),
    ]
}

#[test]
fn test_native_dispatch() {
    let data = vec![
        (Native::Nullary(Box::new(|| 7.0)), vec![], Some(7.0)),
        (Native::Unary(Box::new(|x: f64| x * 2.0)), vec![4.0], Some(8.0)),
        (Native::Binary(Box::new(|x: f64, y: f64| x - y)), vec![4.0, 1.0], Some(3.0)),
        (
            Native::Ternary(Box::new(|x: f64, y: f64, z: f64| x * y + z)),
            vec![2.0, 3.0, 4.0],
            Some(10.0),
        ),
        (Native::Unary(Box::new(|x: f64| x)), vec![], None),
        (Native::Binary(Box::new(|x: f64, _: f64| x)), vec![1.0, 2.0, 3.0], None),
    ];

    for (native, args, expected) in data {
        assert_eq!(native.call(&args), expected);
    }
}

#[test]
fn test_builtins_arity() {
    for func in builtins() {
        assert!(func.is_native(), "{}", func);
        match &func.body {
            FunctionBody::Native(native) => assert_eq!(native.arity(), func.arity(), "{}", func),
            FunctionBody::Group(_) => panic!("{} is not native", func),
        }
    }
}

#[test]
fn test_user_function() {
    let func = Function::user("twice", &["x"], Group::Local(0));
    assert!(!func.is_native());
    assert_eq!(func.arity(), 1);
    assert_eq!(func.to_string(), "twice(x)");
}
