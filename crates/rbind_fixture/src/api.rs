//! The functions `bridge.yaml` exposes.

use std::cell::Cell;
use std::collections::HashMap;
use std::error::Error;

use rbind_runtime::{Complex64, ForeignError, NativeError};

use crate::geom::{Label, Point};
use crate::list::Node;

thread_local! {
    static PINGS: Cell<usize> = const { Cell::new(0) };
}

/// Calls to [`ping`] made on this thread.
pub fn pings() -> usize {
    PINGS.with(Cell::get)
}

fn failure(message: String) -> NativeError {
    Some(Box::new(ForeignError(message)) as Box<dyn Error + Send + Sync>)
}

pub fn div_mod(a: isize, b: isize) -> (isize, isize, NativeError) {
    if b == 0 {
        return (0, 0, failure("division by zero".to_string()));
    }
    (a / b, a % b, None)
}

#[allow(clippy::type_complexity)]
pub fn echo_scalars(
    flag: bool,
    small: i8,
    wide: u64,
    ratio: f32,
    z: Complex64,
    word: String,
    octet: u8,
) -> (bool, i8, u64, f32, Complex64, String, u8) {
    (flag, small, wide, ratio, z, word, octet)
}

pub fn reverse(values: &[f64]) -> Vec<f64> {
    values.iter().rev().copied().collect()
}

/// XOR of the input folded onto four bytes.
pub fn digest(data: &[u8]) -> [u8; 4] {
    let mut out = [0; 4];
    for (idx, byte) in data.iter().enumerate() {
        out[idx % 4] ^= byte;
    }
    out
}

pub fn sum_pair(pair: [u8; 2]) -> isize {
    isize::from(pair[0]) + isize::from(pair[1])
}

pub fn widen(xs: &[i16]) -> Vec<i64> {
    xs.iter().map(|&x| i64::from(x) * 3).collect()
}

pub fn negate(flags: &[bool]) -> Vec<bool> {
    flags.iter().map(|flag| !flag).collect()
}

pub fn shout(words: &[String]) -> Vec<String> {
    words.iter().map(|word| word.to_uppercase()).collect()
}

pub fn flatten(rows: &[Vec<i32>]) -> Vec<i32> {
    rows.concat()
}

pub fn lengths(groups: HashMap<String, Vec<f64>>) -> HashMap<String, isize> {
    groups
        .into_iter()
        .map(|(key, values)| (key, isize::try_from(values.len()).unwrap_or(isize::MAX)))
        .collect()
}

pub fn tally(labels: &[Label]) -> HashMap<Label, isize> {
    let mut counts = HashMap::new();
    for label in labels {
        *counts.entry(label.clone()).or_insert(0) += 1;
    }
    counts
}

pub fn mirror(p: Point) -> Point {
    Point { x: p.y, y: p.x }
}

/// The four corners of the box spanned by a diagonal.
pub fn corners(diagonal: [Point; 2]) -> Vec<Point> {
    let [a, b] = diagonal;
    vec![a, Point { x: b.x, y: a.y }, b, Point { x: a.x, y: b.y }]
}

#[allow(clippy::cast_precision_loss)]
pub fn centroid(points: &[Point]) -> Option<Box<Point>> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (x, y) = points
        .iter()
        .fold((0.0, 0.0), |(x, y), p| (x + p.x, y + p.y));
    Some(Box::new(Point { x: x / n, y: y / n }))
}

/// `n, n - 1, .., 1`.
pub fn chain(n: i32) -> Option<Box<Node>> {
    (1..=n).fold(None, |next, value| Some(Box::new(Node { value, next })))
}

pub fn total(head: Option<Box<Node>>) -> i32 {
    let mut sum = 0;
    let mut cursor = head.as_deref();
    while let Some(node) = cursor {
        sum += node.value;
        cursor = node.next.as_deref();
    }
    sum
}

/// Counts the failures and echoes each back with a prefix.
pub fn count_failures(errs: &[NativeError]) -> (isize, Vec<NativeError>) {
    let seen: Vec<NativeError> = errs
        .iter()
        .map(|err| err.as_ref().and_then(|err| failure(format!("seen: {err}"))))
        .collect();
    let count = seen.iter().filter(|err| err.is_some()).count();
    (isize::try_from(count).unwrap_or(isize::MAX), seen)
}

pub fn halve(x: Option<Box<f64>>) -> Option<Box<f64>> {
    x.map(|x| Box::new(*x / 2.0))
}

pub fn ping() {
    PINGS.with(|pings| pings.set(pings.get() + 1));
}

#[allow(clippy::panic)]
pub fn explode(message: String) {
    panic!("{message}");
}
