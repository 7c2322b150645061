use anyhow::Result;
use rbind_runtime::convert::{
    self, character_elements, character_from_iter, complex_from_iter, complex_vector,
    complex_view, integer_from_iter, integer_view, logical_from_iter, logical_to_bool,
    logical_view, named_list, raw_from_iter, raw_vector, raw_view, real_from_iter, real_vector,
    real_view,
};
use rbind_runtime::{
    BridgeError, Complex128, MockHeap, MockValue, ProtectScope, RApi, RecordFields, Sexp,
    SexpType, call_boundary,
};

const LENGTHS: [usize; 3] = [0, 1, 17];

fn sample(len: usize) -> Vec<f64> {
    (0..len).map(|i| i as f64 * 1.5 - 3.0).collect()
}

#[test]
fn scalars_round_trip() -> Result<()> {
    let heap = MockHeap::new();

    let packed = convert::logical_value(&heap, true);
    assert!(convert::logical_scalar(&heap, packed)?);

    let packed = convert::integer_value(&heap, -42);
    assert_eq!(convert::integer_scalar(&heap, packed)?, -42);

    let packed = convert::real_value(&heap, 0.125);
    assert_eq!(convert::real_scalar(&heap, packed)?, 0.125);

    let z = Complex128::new(1.0, -2.0);
    let packed = convert::complex_value(&heap, z);
    assert_eq!(convert::complex_scalar(&heap, packed)?, z);

    let packed = convert::string_value(&heap, "héllo")?;
    assert_eq!(convert::string_scalar(&heap, packed)?, "héllo");

    assert_eq!(heap.protect_depth(), 0);
    Ok(())
}

#[test]
fn double_bulk_and_elementwise_paths_agree() -> Result<()> {
    let heap = MockHeap::new();
    for len in LENGTHS {
        let values = sample(len);
        let fast = real_vector(&heap, &values);
        let slow = real_from_iter(&heap, values.iter().copied());
        assert_eq!(heap.value(fast), heap.value(slow), "length {len}");

        let viewed = real_view(&heap, fast)?.to_vec();
        let elementwise: Vec<f64> = real_view(&heap, slow)?.iter().copied().collect();
        assert_eq!(viewed, values);
        assert_eq!(elementwise, values);
    }
    Ok(())
}

#[test]
fn byte_slices_round_trip_at_every_length() -> Result<()> {
    let heap = MockHeap::new();
    for len in LENGTHS {
        let bytes: Vec<u8> = (0..len).map(|i| (i * 37 % 256) as u8).collect();
        let fast = raw_vector(&heap, &bytes);
        let slow = raw_from_iter(&heap, bytes.iter().copied());
        assert_eq!(heap.value(fast), MockValue::Raw(bytes.clone()));
        assert_eq!(heap.value(fast), heap.value(slow));
        assert_eq!(raw_view(&heap, fast)?, bytes.as_slice());
    }
    Ok(())
}

#[test]
fn narrowed_integers_travel_through_integer_vectors() -> Result<()> {
    let heap = MockHeap::new();
    let values: Vec<i64> = vec![-3, 0, 70_000];
    let packed = integer_from_iter(&heap, values.iter().map(|&v| v as i32));
    let back: Vec<i64> = integer_view(&heap, packed)?
        .iter()
        .map(|&v| i64::from(v))
        .collect();
    assert_eq!(back, values);

    let fast = convert::integer_vector(&heap, &[1, 2, 3]);
    let slow = integer_from_iter(&heap, [1u16, 2, 3].into_iter().map(i32::from));
    assert_eq!(heap.value(fast), heap.value(slow));
    Ok(())
}

#[test]
fn complex_and_logical_vectors_round_trip() -> Result<()> {
    let heap = MockHeap::new();
    let zs = vec![Complex128::new(0.0, 1.0), Complex128::new(-1.0, 0.5)];
    let fast = complex_vector(&heap, &zs);
    let slow = complex_from_iter(&heap, zs.iter().copied());
    assert_eq!(heap.value(fast), heap.value(slow));
    assert_eq!(complex_view(&heap, fast)?, zs.as_slice());

    let flags = vec![true, false, true];
    let packed = logical_from_iter(&heap, flags.iter().copied());
    let back = logical_view(&heap, packed)?
        .iter()
        .map(|&cell| logical_to_bool(cell))
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(back, flags);
    Ok(())
}

#[test]
fn character_vectors_keep_na() -> Result<()> {
    let heap = MockHeap::new();
    let cells = vec![Some("a"), None, Some("")];
    let packed = character_from_iter(&heap, cells.iter().copied())?;
    let back = character_elements(&heap, packed)?;
    assert_eq!(
        back,
        vec![Some("a".to_string()), None, Some(String::new())]
    );
    Ok(())
}

fn pack_point(heap: &MockHeap, x: f64, y: f64) -> Result<Sexp, BridgeError> {
    let mut scope = ProtectScope::new(heap);
    let out = named_list(&mut scope, &["x", "Y"])?;
    heap.set_vector_elt(out, 0, convert::real_value(heap, x));
    heap.set_vector_elt(out, 1, convert::real_value(heap, y));
    Ok(out)
}

fn unpack_point(heap: &MockHeap, value: Sexp) -> Result<(f64, f64), BridgeError> {
    let fields = RecordFields::new(heap, value, "geom::Point", &["x", "Y"])?;
    Ok((
        convert::real_scalar(heap, fields.get("x")?)?,
        convert::real_scalar(heap, fields.get("Y")?)?,
    ))
}

#[test]
fn records_round_trip_through_named_lists() -> Result<()> {
    let heap = MockHeap::new();
    let packed = pack_point(&heap, 1.0, -1.0)?;
    assert_eq!(heap.protect_depth(), 0);
    assert_eq!(
        heap.strings(heap.names(packed)),
        vec![Some("x".to_string()), Some("Y".to_string())]
    );
    assert_eq!(unpack_point(&heap, packed)?, (1.0, -1.0));
    Ok(())
}

#[test]
fn records_tolerate_extra_and_reject_missing_fields() -> Result<()> {
    let heap = MockHeap::new();
    let x = convert::real_value(&heap, 4.0);
    let y = convert::real_value(&heap, 5.0);
    let colour = convert::string_value(&heap, "red")?;

    let with_extra = heap.named(MockValue::List(vec![colour, y, x]), &["colour", "Y", "x"]);
    assert_eq!(unpack_point(&heap, with_extra)?, (4.0, 5.0));

    let lower_case = heap.named(MockValue::List(vec![x, y]), &["x", "y"]);
    assert_eq!(
        unpack_point(&heap, lower_case),
        Err(BridgeError::MissingField {
            record: "geom::Point".into(),
            field: "Y".into(),
        })
    );
    Ok(())
}

#[test]
fn protection_is_balanced_on_every_exit_path() {
    let heap = MockHeap::new();

    call_boundary(&heap, "ok", |api| {
        let mut scope = ProtectScope::new(api);
        let out = named_list(&mut scope, &["r0", "r1"])?;
        api.set_vector_elt(out, 0, convert::integer_value(api, 1));
        api.set_vector_elt(out, 1, convert::integer_value(api, 2));
        Ok(out)
    });
    assert_eq!(heap.protect_depth(), 0);

    call_boundary(&heap, "err", |api| {
        let mut scope = ProtectScope::new(api);
        let out = named_list(&mut scope, &["r0"])?;
        let bad = convert::string_value(api, "nul\0byte")?;
        api.set_vector_elt(out, 0, bad);
        Ok(out)
    });
    assert_eq!(heap.protect_depth(), 0);

    call_boundary(&heap, "panic", |api| {
        let mut scope = ProtectScope::new(api);
        scope.protect(api.alloc_vector(SexpType::List, 3));
        let cells: Vec<Sexp> = Vec::new();
        Ok(cells[scope.len()])
    });
    assert_eq!(heap.protect_depth(), 0);
    assert!(heap.peak_depth() >= 2);
}
