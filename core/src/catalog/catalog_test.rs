//! Internal-consistency checks for the operation catalog.
//!
//! The original system validated its declarative operation description at
//! build time; these tests are that validation.

use super::*;

fn composites() -> impl Iterator<Item = Opcode> {
    ALL_OPCODES.iter().copied().filter(|op| op.is_composite())
}

#[test]
fn no_duplicate_signatures() {
    let mut seen = hashbrown::HashSet::new();
    for op in composites() {
        let info = op.info();
        let sig = (info.kind, info.name, info.args);
        assert!(
            seen.insert(sig),
            "duplicate catalog signature for {}",
            info.prototype
        );
    }
}

#[test]
fn atoms_return_themselves() {
    for op in ALL_OPCODES.iter().copied().filter(|op| op.is_atom()) {
        assert_eq!(op.info().returns, op);
        assert!(op.info().args.is_empty());
    }
}

#[test]
fn composite_returns_are_values() {
    for op in composites() {
        let ret = op.info().returns;
        assert!(
            matches!(
                ret,
                Opcode::Number | Opcode::Boolean | Opcode::String | Opcode::NumVecElem
            ),
            "{} returns non-value type {:?}",
            op.info().prototype,
            ret
        );
    }
}

#[test]
fn array_flags_consistent() {
    for op in composites() {
        let info = op.info();
        assert_eq!(
            info.has_array(),
            info.array_granularity > 0,
            "{}: array flag disagrees with granularity",
            info.prototype
        );
        if info.has_array() {
            assert!(
                matches!(info.args.last(), Some(Opcode::Number | Opcode::String)),
                "{}: array element must be number or string",
                info.prototype
            );
        }
    }
}

#[test]
fn min_valid_requires_numeric_absorbing_array() {
    for op in composites() {
        let info = op.info();
        // A nonzero minimum element count is exactly the default
        // minimum-valid count, so the two must agree.
        assert_eq!(
            info.flags.contains(OpFlags::MIN_VALID),
            info.array_min_elems > 0,
            "{}",
            info.prototype
        );
        if info.flags.contains(OpFlags::MIN_VALID) {
            assert!(info.has_array(), "{}", info.prototype);
            assert!(
                info.flags.contains(OpFlags::ABSORB_MISSING),
                "{}",
                info.prototype
            );
            assert_eq!(info.args.last(), Some(&Opcode::Number), "{}", info.prototype);
            assert_eq!(info.array_granularity, 1, "{}", info.prototype);
        }
    }
}

#[test]
fn string_results_with_numeric_args_absorb_missing() {
    // A string result has no missing representation, so default missing
    // propagation could never produce one; such operations must handle
    // missing inputs themselves.
    for op in composites() {
        let info = op.info();
        if info.returns != Opcode::String {
            continue;
        }
        let has_numeric_value_arg = info
            .args
            .iter()
            .any(|a| matches!(a, Opcode::Number | Opcode::Boolean | Opcode::Integer));
        if has_numeric_value_arg {
            assert!(
                info.flags.contains(OpFlags::ABSORB_MISSING),
                "{} returns string with numeric arguments but does not absorb missing",
                info.prototype
            );
        }
    }
}

#[test]
fn lookup_exact_and_abbreviated() {
    let mean = lookup_function("MEAN").unwrap();
    assert_eq!(mean, &[Opcode::Mean]);
    assert_eq!(lookup_function("mea").unwrap(), &[Opcode::Mean]);
    assert!(lookup_function("me").is_none());
    assert!(lookup_function("MEANX").is_none());

    assert_eq!(lookup_function("cdf.nor").unwrap(), &[Opcode::CdfNormal]);
    assert!(lookup_function("cdf").is_none());
}

#[test]
fn lookup_returns_whole_overload_block() {
    assert_eq!(
        lookup_function("RND").unwrap(),
        &[Opcode::Rnd1, Opcode::Rnd2, Opcode::Rnd3]
    );
    assert_eq!(
        lookup_function("LAG").unwrap(),
        &[
            Opcode::LagNum,
            Opcode::LagNumN,
            Opcode::LagStr,
            Opcode::LagStrN
        ]
    );
    // The variable overload of SYSMIS must come first so that
    // SYSMIS(numvar) tests the raw record value.
    assert_eq!(
        lookup_function("SYSMIS").unwrap(),
        &[Opcode::SysmisVar, Opcode::SysmisNum]
    );
}

#[test]
fn lookup_is_deterministic() {
    for _ in 0..3 {
        assert_eq!(lookup_function("substr").unwrap()[0], Opcode::Substr2);
    }
}

#[test]
fn min_valid_suffix_extraction() {
    assert_eq!(extract_min_valid("MEAN.2"), ("MEAN", Some(2)));
    assert_eq!(extract_min_valid("MEAN"), ("MEAN", None));
    assert_eq!(extract_min_valid("CDF.NORMAL"), ("CDF.NORMAL", None));
    assert_eq!(extract_min_valid("X.10"), ("X", Some(10)));
}
