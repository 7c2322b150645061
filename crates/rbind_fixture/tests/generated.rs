use std::collections::BTreeMap;

use rbind_fixture::shim::{
    Complex128, ERROR_CLASS, MockValue, NA_INTEGER, NA_LOGICAL, RApi, Sexp, with_heap,
};
use rbind_fixture::{FOREIGN, api, bridge};

fn alloc(value: MockValue) -> Sexp {
    with_heap(|heap| heap.alloc(value))
}

fn named(value: MockValue, names: &[&str]) -> Sexp {
    with_heap(|heap| heap.named(value, names))
}

fn value(sexp: Sexp) -> MockValue {
    with_heap(|heap| heap.value(sexp))
}

fn names(sexp: Sexp) -> Vec<Option<String>> {
    with_heap(|heap| heap.strings(heap.names(sexp)))
}

fn field(list: Sexp, name: &str) -> Sexp {
    with_heap(|heap| {
        let names = heap.strings(heap.names(list));
        let idx = names
            .iter()
            .position(|n| n.as_deref() == Some(name))
            .unwrap_or_else(|| panic!("no element `{name}` in {names:?}"));
        heap.vector_elt(list, idx)
    })
}

fn item(list: Sexp, idx: usize) -> Sexp {
    with_heap(|heap| heap.vector_elt(list, idx))
}

fn is_null(sexp: Sexp) -> bool {
    with_heap(|heap| heap.is_null(sexp))
}

/// Message of an `rbind_error` condition, or `None` for any other value.
fn failure(sexp: Sexp) -> Option<String> {
    with_heap(|heap| {
        let class = heap.strings(heap.class_of(sexp));
        if class.first().cloned().flatten().as_deref() != Some(ERROR_CLASS) {
            return None;
        }
        heap.strings(heap.vector_elt(sexp, 0)).pop().flatten()
    })
}

fn assert_balanced() {
    assert_eq!(with_heap(|heap| heap.protect_depth()), 0);
}

fn integer_map(map: Sexp) -> BTreeMap<String, i32> {
    let MockValue::Integer(cells) = value(map) else {
        panic!("expected an integer vector, found {:?}", value(map));
    };
    names(map)
        .into_iter()
        .map(Option::unwrap_or_default)
        .zip(cells)
        .collect()
}

fn point(x: f64, y: f64) -> Sexp {
    let x = alloc(MockValue::Real(vec![x]));
    let y = alloc(MockValue::Real(vec![y]));
    named(MockValue::List(vec![x, y]), &["x", "Y"])
}

fn coords(point: Sexp) -> (MockValue, MockValue) {
    (value(field(point, "x")), value(field(point, "Y")))
}

#[test]
fn scalars_cross_unchanged() {
    let out = bridge::wrapped_echo_scalars(
        alloc(MockValue::Logical(vec![1])),
        alloc(MockValue::Integer(vec![-7])),
        alloc(MockValue::Integer(vec![40_000])),
        alloc(MockValue::Real(vec![0.5])),
        alloc(MockValue::Complex(vec![Complex128::new(1.5, -2.0)])),
        alloc(MockValue::Character(vec![Some("héllo".to_string())])),
        alloc(MockValue::Integer(vec![255])),
    );
    assert_eq!(failure(out), None);
    assert_eq!(
        names(out),
        ["r0", "r1", "r2", "r3", "r4", "r5", "r6"].map(|n| Some(n.to_string()))
    );
    assert_eq!(value(item(out, 0)), MockValue::Logical(vec![1]));
    assert_eq!(value(item(out, 1)), MockValue::Integer(vec![-7]));
    assert_eq!(value(item(out, 2)), MockValue::Integer(vec![40_000]));
    assert_eq!(value(item(out, 3)), MockValue::Real(vec![0.5]));
    assert_eq!(
        value(item(out, 4)),
        MockValue::Complex(vec![Complex128::new(1.5, -2.0)])
    );
    assert_eq!(
        value(item(out, 5)),
        MockValue::Character(vec![Some("héllo".to_string())])
    );
    assert_eq!(value(item(out, 6)), MockValue::Integer(vec![255]));
    assert_balanced();
}

#[test]
fn named_results_carry_the_error_slot() {
    let out = bridge::wrapped_div_mod(
        alloc(MockValue::Integer(vec![7])),
        alloc(MockValue::Integer(vec![2])),
    );
    assert_eq!(value(field(out, "quo")), MockValue::Integer(vec![3]));
    assert_eq!(value(field(out, "rem")), MockValue::Integer(vec![1]));
    assert!(is_null(field(out, "err")));

    let out = bridge::wrapped_div_mod(
        alloc(MockValue::Integer(vec![1])),
        alloc(MockValue::Integer(vec![0])),
    );
    assert_eq!(
        value(field(out, "err")),
        MockValue::Character(vec![Some("division by zero".to_string())])
    );
    assert_balanced();
}

#[test]
fn integer_na_is_refused_at_the_boundary() {
    let out = bridge::wrapped_div_mod(
        alloc(MockValue::Integer(vec![NA_INTEGER])),
        alloc(MockValue::Integer(vec![1])),
    );
    assert_eq!(
        failure(out).as_deref(),
        Some("div_mod: argument `a`: NA is not a valid integer value")
    );

    let out = bridge::wrapped_widen(alloc(MockValue::Integer(vec![1, NA_INTEGER])));
    assert_eq!(
        failure(out).as_deref(),
        Some("widen: argument `xs`: NA is not a valid integer value")
    );
    assert_balanced();
}

#[test]
fn bulk_vectors_are_copied_in_one_pass() {
    let out = bridge::wrapped_reverse(alloc(MockValue::Real(vec![1.0, 2.0, 3.0])));
    assert_eq!(value(out), MockValue::Real(vec![3.0, 2.0, 1.0]));

    let out = bridge::wrapped_reverse(alloc(MockValue::Real(Vec::new())));
    assert_eq!(value(out), MockValue::Real(Vec::new()));

    let out = bridge::wrapped_digest(alloc(MockValue::Raw(vec![1, 2, 3, 4, 5])));
    assert_eq!(value(out), MockValue::Raw(vec![4, 2, 3, 4]));

    let out = bridge::wrapped_reverse(alloc(MockValue::Integer(vec![1])));
    assert_eq!(
        failure(out).as_deref(),
        Some("reverse: argument `values`: expected a double vector, found integer")
    );
    assert_balanced();
}

#[test]
fn fixed_arrays_check_their_length() {
    let out = bridge::wrapped_sum_pair(alloc(MockValue::Raw(vec![3, 4])));
    assert_eq!(value(out), MockValue::Integer(vec![7]));

    let out = bridge::wrapped_sum_pair(alloc(MockValue::Raw(vec![1, 2, 3])));
    assert_eq!(
        failure(out).as_deref(),
        Some("sum_pair: argument `pair`: expected length 2, found length 3")
    );

    let out = bridge::wrapped_corners(alloc(MockValue::List(vec![point(0.0, 0.0)])));
    assert_eq!(
        failure(out).as_deref(),
        Some("corners: argument `diagonal`: expected length 2, found length 1")
    );
    assert_balanced();
}

#[test]
fn element_vectors_convert_each_cell() {
    let out = bridge::wrapped_widen(alloc(MockValue::Integer(vec![-3, 0, 300])));
    assert_eq!(value(out), MockValue::Integer(vec![-9, 0, 900]));

    let out = bridge::wrapped_negate(alloc(MockValue::Logical(vec![1, 0])));
    assert_eq!(value(out), MockValue::Logical(vec![0, 1]));

    let out = bridge::wrapped_negate(alloc(MockValue::Logical(vec![NA_LOGICAL])));
    assert_eq!(
        failure(out).as_deref(),
        Some("negate: argument `flags`: NA is not a valid logical value")
    );

    let words = alloc(MockValue::Character(vec![
        Some("ab".to_string()),
        Some("c".to_string()),
    ]));
    let out = bridge::wrapped_shout(words);
    assert_eq!(
        value(out),
        MockValue::Character(vec![Some("AB".to_string()), Some("C".to_string())])
    );

    let out = bridge::wrapped_shout(alloc(MockValue::Character(vec![None])));
    assert_eq!(
        failure(out).as_deref(),
        Some("shout: argument `words`: NA is not a valid character value")
    );
    assert_balanced();
}

#[test]
fn nested_slices_travel_as_lists() {
    let rows = vec![
        alloc(MockValue::Integer(vec![1, 2])),
        alloc(MockValue::Integer(Vec::new())),
        alloc(MockValue::Integer(vec![3])),
    ];
    let out = bridge::wrapped_flatten(alloc(MockValue::List(rows)));
    assert_eq!(value(out), MockValue::Integer(vec![1, 2, 3]));
    assert_balanced();
}

#[test]
fn maps_use_names_as_keys() {
    let groups = named(
        MockValue::List(vec![
            alloc(MockValue::Real(vec![1.0, 2.0])),
            alloc(MockValue::Real(Vec::new())),
        ]),
        &["a", "b"],
    );
    let out = bridge::wrapped_lengths(groups);
    assert_eq!(
        integer_map(out),
        BTreeMap::from([("a".to_string(), 2), ("b".to_string(), 0)])
    );

    let out = bridge::wrapped_lengths(alloc(MockValue::List(vec![alloc(MockValue::Real(
        vec![1.0],
    ))])));
    assert_eq!(
        failure(out).as_deref(),
        Some("lengths: argument `groups`: expected a named list")
    );

    let labels = alloc(MockValue::Character(
        ["x", "y", "x"].map(|l| Some(l.to_string())).to_vec(),
    ));
    let out = bridge::wrapped_tally(labels);
    assert_eq!(
        integer_map(out),
        BTreeMap::from([("x".to_string(), 2), ("y".to_string(), 1)])
    );
    assert_balanced();
}

#[test]
fn records_read_fields_by_name() {
    let out = bridge::wrapped_mirror(point(1.0, 2.0));
    assert_eq!(names(out), [Some("x".to_string()), Some("Y".to_string())]);
    assert_eq!(
        coords(out),
        (MockValue::Real(vec![2.0]), MockValue::Real(vec![1.0]))
    );

    // Elements the record does not declare are ignored, in any position.
    let note = alloc(MockValue::Character(vec![Some("origin".to_string())]));
    let y = alloc(MockValue::Real(vec![4.0]));
    let x = alloc(MockValue::Real(vec![3.0]));
    let extra = named(MockValue::List(vec![note, y, x]), &["note", "Y", "x"]);
    let out = bridge::wrapped_mirror(extra);
    assert_eq!(
        coords(out),
        (MockValue::Real(vec![4.0]), MockValue::Real(vec![3.0]))
    );
    assert_balanced();
}

#[test]
fn records_report_missing_fields() {
    let x = alloc(MockValue::Real(vec![1.0]));
    let y = alloc(MockValue::Real(vec![2.0]));
    // The Rust field name is not accepted in place of the renamed one.
    let out = bridge::wrapped_mirror(named(MockValue::List(vec![x, y]), &["x", "y"]));
    assert_eq!(
        failure(out).as_deref(),
        Some("mirror: argument `p`: missing element `Y` for crate::geom::Point")
    );

    let out = bridge::wrapped_mirror(alloc(MockValue::List(vec![x, y])));
    assert_eq!(
        failure(out).as_deref(),
        Some("mirror: argument `p`: expected a named list")
    );
    assert_balanced();
}

#[test]
fn record_collections_and_pointers() {
    let diagonal = alloc(MockValue::List(vec![point(0.0, 0.0), point(2.0, 1.0)]));
    let out = bridge::wrapped_corners(diagonal);
    let corners: Vec<_> = (0..4).map(|idx| coords(item(out, idx))).collect();
    assert_eq!(
        corners,
        [(0.0, 0.0), (2.0, 0.0), (2.0, 1.0), (0.0, 1.0)]
            .map(|(x, y)| (MockValue::Real(vec![x]), MockValue::Real(vec![y])))
    );

    let out = bridge::wrapped_centroid(alloc(MockValue::List(vec![
        point(0.0, 0.0),
        point(4.0, 2.0),
    ])));
    assert_eq!(
        coords(out),
        (MockValue::Real(vec![2.0]), MockValue::Real(vec![1.0]))
    );

    let out = bridge::wrapped_centroid(alloc(MockValue::List(Vec::new())));
    assert!(is_null(out));
    assert_balanced();
}

#[test]
fn recursive_records_round_trip() {
    let list = bridge::wrapped_chain(alloc(MockValue::Integer(vec![3])));
    assert_eq!(names(list), [Some("value".to_string()), Some("next".to_string())]);
    assert_eq!(value(field(list, "value")), MockValue::Integer(vec![3]));
    let last = field(field(list, "next"), "next");
    assert_eq!(value(field(last, "value")), MockValue::Integer(vec![1]));
    assert!(is_null(field(last, "next")));

    let out = bridge::wrapped_total(list);
    assert_eq!(value(out), MockValue::Integer(vec![6]));

    let out = bridge::wrapped_total(alloc(MockValue::Nil));
    assert_eq!(value(out), MockValue::Integer(vec![0]));
    assert_balanced();
}

#[test]
fn errors_travel_as_messages() {
    let errs = alloc(MockValue::Character(vec![
        Some("disk full".to_string()),
        None,
        Some("timeout".to_string()),
    ]));
    let out = bridge::wrapped_count_failures(errs);
    assert_eq!(value(field(out, "r0")), MockValue::Integer(vec![2]));
    assert_eq!(
        value(field(out, "r1")),
        MockValue::Character(vec![
            Some("seen: disk full".to_string()),
            None,
            Some("seen: timeout".to_string()),
        ])
    );
    assert_balanced();
}

#[test]
fn optional_scalars_map_null_to_none() {
    let out = bridge::wrapped_halve(alloc(MockValue::Real(vec![3.0])));
    assert_eq!(value(out), MockValue::Real(vec![1.5]));

    let out = bridge::wrapped_halve(alloc(MockValue::Nil));
    assert!(is_null(out));
    assert_balanced();
}

#[test]
fn functions_without_results_return_null() {
    let before = api::pings();
    let out = bridge::wrapped_ping();
    assert!(is_null(out));
    assert_eq!(api::pings(), before + 1);
}

#[test]
fn panics_become_conditions() {
    let out = bridge::wrapped_explode(alloc(MockValue::Character(vec![Some(
        "boom".to_string(),
    )])));
    assert_eq!(failure(out).as_deref(), Some("explode: panic: boom"));
    assert_balanced();
}

#[test]
fn foreign_wrappers_call_the_compiled_entry_points() {
    assert!(FOREIGN.contains(".Call(\"wrapped_div_mod\", a, b, PACKAGE = \"fixture\")"));
    assert!(FOREIGN.contains(".Call(\"wrapped_ping\", PACKAGE = \"fixture\")"));
    assert!(FOREIGN.contains("c(\"x\", \"Y\")"));
}
