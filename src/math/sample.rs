//! Sampling of implicit functions `f(x, y)` over a rectangular grid.
//!
//! A curve plotter contours `f(x, y) = 0` from the values at the corners of each grid cell. The
//! function can be an expression tree reading the variables `x` and `y`, or a plain closure.

use log::debug;
use nix::errno::Errno;

use crate::math::context::Context;
use crate::math::error::{ErrorKind, MathError, Result};
use crate::math::eval::evaluate;
use crate::math::group::Group;

pub trait ImplicitFunction {
    fn value(&self, ctx: &mut Context, x: f64, y: f64) -> Result<f64>;
}

/// Evaluates the tree with the context variables `x` and `y` bound to the sample point.
///
/// Existing definitions of `x` and `y` are overwritten, and both stay bound to the last sample
/// point afterwards.
impl ImplicitFunction for Group {
    fn value(&self, ctx: &mut Context, x: f64, y: f64) -> Result<f64> {
        ctx.bind_number("x", x);
        ctx.bind_number("y", y);
        evaluate(ctx, self)
    }
}

/// Native formula, eg. `Formula(|x, y| x * x + y * y - 1.0)`
pub struct Formula<F>(pub F);

impl<F> ImplicitFunction for Formula<F>
where
    F: Fn(f64, f64) -> f64,
{
    fn value(&self, _ctx: &mut Context, x: f64, y: f64) -> Result<f64> {
        Ok((self.0)(x, y))
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Bounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

/// Corner values of `columns` x `rows` cells, row-major, `y_min` first
#[derive(Debug, PartialEq, Clone)]
pub struct Grid {
    pub columns: usize,
    pub rows: usize,
    pub values: Vec<f64>,
}

impl Grid {
    /// Value at corner (`column`, `row`), both in `0..=columns` and `0..=rows`
    pub fn get(&self, column: usize, row: usize) -> Option<f64> {
        if column > self.columns || row > self.rows {
            return None;
        }

        let index = self
            .columns
            .checked_add(1)
            .and_then(|width| width.checked_mul(row))
            .and_then(|base| base.checked_add(column))?;

        self.values.get(index).copied()
    }
}

/// Evaluate `f` at every cell corner of the grid spanning `bounds`
pub fn sample_grid<F>(
    ctx: &mut Context,
    f: &F,
    bounds: &Bounds,
    columns: usize,
    rows: usize,
) -> Result<Grid>
where
    F: ImplicitFunction + ?Sized,
{
    if columns == 0 || rows == 0 {
        return Err(ctx.fail(MathError::new(ErrorKind::InvalidCall)));
    }

    let len = columns
        .checked_add(1)
        .and_then(|width| rows.checked_add(1).and_then(|height| width.checked_mul(height)));
    let len = match len {
        Some(len) => len,
        None => return Err(ctx.fail(MathError::with_errno(ErrorKind::Memory, Errno::ENOMEM))),
    };
    let mut values = Vec::new();
    if values.try_reserve_exact(len).is_err() {
        return Err(ctx.fail(MathError::with_errno(ErrorKind::Memory, Errno::ENOMEM)));
    }

    let dx = (bounds.x_max - bounds.x_min) / columns as f64;
    let dy = (bounds.y_max - bounds.y_min) / rows as f64;
    for row in 0..=rows {
        let y = bounds.y_min + dy * row as f64;
        for column in 0..=columns {
            let x = bounds.x_min + dx * column as f64;
            values.push(f.value(ctx, x, y)?);
        }
    }

    debug!("sampled {} x {} grid", columns, rows);
    Ok(Grid {
        columns,
        rows,
        values,
    })
}

#[cfg(test)]
fn unit_square() -> Bounds {
    Bounds {
        x_min: -1.0,
        x_max: 1.0,
        y_min: -1.0,
        y_max: 1.0,
    }
}

#[test]
fn test_formula_grid() {
    let mut ctx = Context::new();
    let circle = Formula(|x: f64, y: f64| x * x + y * y - 1.0);
    let grid = sample_grid(&mut ctx, &circle, &unit_square(), 2, 2).unwrap();

    assert_eq!(grid.values.len(), 9);
    let data = vec![
        ((0, 0), 1.0),
        ((1, 0), 0.0),
        ((1, 1), -1.0),
        ((2, 1), 0.0),
        ((2, 2), 1.0),
    ];
    for ((column, row), expected) in data {
        assert_eq!(grid.get(column, row), Some(expected));
    }
    assert_eq!(grid.get(3, 0), None);
    assert_eq!(grid.get(0, 3), None);
}

#[test]
fn test_group_grid() {
    use crate::math::group::BinaryOperator;

    // x - y
    let tree = Group::binary(
        BinaryOperator::Subtract,
        Group::variable("x"),
        Group::variable("y"),
    );

    let mut ctx = Context::new();
    let bounds = Bounds {
        x_min: 0.0,
        x_max: 4.0,
        y_min: 0.0,
        y_max: 2.0,
    };
    let grid = sample_grid(&mut ctx, &tree, &bounds, 4, 2).unwrap();
    assert_eq!(grid.get(4, 0), Some(4.0));
    assert_eq!(grid.get(0, 2), Some(-2.0));
    assert_eq!(grid.get(3, 1), Some(2.0));
    assert_eq!(ctx.locals_len(), 0);

    // Left bound to the last corner
    assert_eq!(ctx.compute_variable("x"), Ok(4.0));
    assert_eq!(ctx.compute_variable("y"), Ok(2.0));
}

#[test]
fn test_grid_errors() {
    let mut ctx = Context::new();
    let circle = Formula(|x: f64, y: f64| x * x + y * y);
    let err = sample_grid(&mut ctx, &circle, &unit_square(), 0, 4).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidCall);

    // z is never bound
    let tree = Group::variable("z");
    let err = sample_grid(&mut ctx, &tree, &unit_square(), 1, 1).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidCall);

    let data = vec![(usize::MAX, 1), (1, usize::MAX), (usize::MAX / 2, 4)];
    for (columns, rows) in data {
        let err = sample_grid(&mut ctx, &circle, &unit_square(), columns, rows).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Memory);
        assert_eq!(err.errno, Some(Errno::ENOMEM));
    }
}

#[test]
fn test_grid_get_out_of_range() {
    let grid = Grid {
        columns: usize::MAX,
        rows: 1,
        values: vec![1.0, 2.0],
    };
    assert_eq!(grid.get(0, 0), Some(1.0));
    assert_eq!(grid.get(1, 0), Some(2.0));
    assert_eq!(grid.get(0, 1), None);
    assert_eq!(grid.get(usize::MAX, 1), None);
}
