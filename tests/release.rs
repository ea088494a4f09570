use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;

use mathpad::{free_tree, parse, tokenize, BinaryOperator, Context, ErrorKind, Group};

/// Counts live heap blocks per thread so parallel tests don't see each other
struct Counting;

thread_local! {
    static LIVE: Cell<isize> = const { Cell::new(0) };
}

fn adjust(delta: isize) {
    let _ = LIVE.try_with(|live| live.set(live.get() + delta));
}

fn live() -> isize {
    LIVE.with(|live| live.get())
}

unsafe impl GlobalAlloc for Counting {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            adjust(1);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        adjust(-1);
    }
}

#[global_allocator]
static GLOBAL: Counting = Counting;

fn warm_up(ctx: &mut Context) {
    // Forces the keyword and symbol tables, which live for the whole process
    tokenize(ctx, "sin ∈").unwrap();
}

#[test]
fn test_free_tree() {
    let mut ctx = Context::new();
    warm_up(&mut ctx);

    let tokens = tokenize(&mut ctx, "-(-3.1) * -(7 * (3 - 2) + 5)").unwrap();
    let before = live();
    let tree = parse(&mut ctx, &tokens).unwrap();
    assert!(live() > before);

    free_tree(tree);
    assert_eq!(live(), before);
}

#[test]
fn test_failed_parse_releases_partial_tree() {
    let mut ctx = Context::new();
    warm_up(&mut ctx);

    let data = vec![
        ("(1 + 2) * (3 +", ErrorKind::HangingOperator),
        ("-(4 * 5) - (6", ErrorKind::UnclosedParenthesis),
        ("1 + 2 * 3 4", ErrorKind::InvalidToken),
    ];

    for (input, kind) in data {
        let tokens = tokenize(&mut ctx, input).unwrap();
        let before = live();
        let err = parse(&mut ctx, &tokens).unwrap_err();
        assert_eq!(err.kind, kind);
        assert_eq!(live(), before, "{}", input);
    }
}

#[test]
fn test_free_deep_tree() {
    let before = live();

    let mut tree = Group::Number(0.0);
    for _ in 0..100_000 {
        tree = Group::binary(BinaryOperator::Multiply, Group::negate(tree), Group::Number(2.0));
    }
    assert!(live() > before);

    free_tree(tree);
    assert_eq!(live(), before);
}
