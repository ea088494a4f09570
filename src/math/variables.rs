use crate::math::group::Group;

/// A named expression, evaluated every time it is referenced
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub group: Group,
}

impl Variable {
    pub fn new(name: &str, group: Group) -> Self {
        Self {
            name: name.to_string(),
            group,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Frame {
    base: usize,
    len: usize,
}

/// Stack of numbers used to pass arguments into function calls
///
/// Callers push arguments, the callee sees its own arguments through the innermost frame, and
/// the caller pops the arguments once the call returns.
#[derive(Debug, Default)]
pub struct Locals {
    values: Vec<f64>,
    frames: Vec<Frame>,
}

impl Locals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index of the new value, or `None` if the stack could not grow
    pub fn push(&mut self, value: f64) -> Option<usize> {
        self.values.try_reserve(1).ok()?;
        self.values.push(value);
        Some(self.values.len() - 1)
    }

    pub fn pop(&mut self) -> Option<f64> {
        self.values.pop()
    }

    pub fn set(&mut self, index: usize, value: f64) -> bool {
        match self.values.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Most recent `count` values, in push order
    pub fn top(&self, count: usize) -> Option<&[f64]> {
        let base = self.values.len().checked_sub(count)?;
        Some(&self.values[base..])
    }

    pub fn truncate(&mut self, len: usize) {
        self.values.truncate(len);
    }

    /// Make the top `len` values the arguments of a new call
    pub fn push_frame(&mut self, len: usize) -> bool {
        match self.values.len().checked_sub(len) {
            Some(base) => {
                self.frames.push(Frame { base, len });
                true
            }
            None => false,
        }
    }

    pub fn pop_frame(&mut self) {
        assert!(!self.frames.is_empty());
        self.frames.pop();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Drop every frame above `depth`
    pub fn truncate_frames(&mut self, depth: usize) {
        self.frames.truncate(depth);
    }

    /// `index`-th argument of the innermost call
    pub fn argument(&self, index: usize) -> Option<f64> {
        let frame = self.frames.last()?;
        if index >= frame.len {
            return None;
        }

        self.get(frame.base + index)
    }
}

#[test]
fn test_push_pop_set() {
    let mut locals = Locals::new();
    assert_eq!(locals.pop(), None);
    assert!(!locals.set(0, 1.0));

    assert_eq!(locals.push(1.0), Some(0));
    assert_eq!(locals.push(2.0), Some(1));
    assert!(locals.set(0, 5.0));
    assert_eq!(locals.get(0), Some(5.0));
    assert!(!locals.set(2, 1.0));

    assert_eq!(locals.pop(), Some(2.0));
    assert_eq!(locals.pop(), Some(5.0));
    assert!(locals.is_empty());
}

#[test]
fn test_top() {
    let mut locals = Locals::new();
    for v in &[1.0, 2.0, 3.0] {
        locals.push(*v);
    }

    assert_eq!(locals.top(0), Some(&[][..]));
    assert_eq!(locals.top(2), Some(&[2.0, 3.0][..]));
    assert_eq!(locals.top(3), Some(&[1.0, 2.0, 3.0][..]));
    assert_eq!(locals.top(4), None);
}

#[test]
fn test_frames() {
    let mut locals = Locals::new();
    assert_eq!(locals.argument(0), None);

    locals.push(10.0);
    locals.push(20.0);
    locals.push(30.0);
    assert!(locals.push_frame(2));
    assert_eq!(locals.argument(0), Some(20.0));
    assert_eq!(locals.argument(1), Some(30.0));
    assert_eq!(locals.argument(2), None);

    // Nested call sees only its own arguments
    locals.push(40.0);
    assert!(locals.push_frame(1));
    assert_eq!(locals.depth(), 2);
    assert_eq!(locals.argument(0), Some(40.0));
    assert_eq!(locals.argument(1), None);

    locals.pop_frame();
    locals.pop();
    assert_eq!(locals.argument(1), Some(30.0));
    locals.pop_frame();

    assert!(!locals.push_frame(4));
    assert_eq!(locals.depth(), 0);

    assert!(locals.push_frame(1));
    assert!(locals.push_frame(0));
    locals.truncate_frames(0);
    assert_eq!(locals.depth(), 0);
}
