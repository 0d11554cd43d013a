//! Interval-seeded test case generation (spec.md §4.11).
//!
//! The original ships no seeding logic at all — `fuzzer_init` only ever adds
//! the single all-zero seed — so this module is new structure, built
//! directly from spec.md's description rather than ported from C.

use crate::interval::domain::{Interval, IntervalState};
use crate::types::TypeId;

use super::corpus::TestCase;

/// Representative values to try for one argument's interval: lower bound,
/// upper bound, and an interior midpoint (0 if the interval straddles
/// zero). `TOP` carries no information to branch on, so it falls back to
/// the full encodable byte range's own representatives (spec.md §8 scenario
/// 3: `{-128, 0, 127}`) rather than a single default. A bottom interval
/// (`lower > upper`) still contributes a single default value instead of
/// being skipped outright — skipping would shrink the encoded byte buffer
/// and break the fixed per-argument byte width the decoder expects.
fn representative_values(interval: Interval) -> Vec<i32> {
    if interval.lower > interval.upper {
        return vec![0];
    }
    if interval == Interval::TOP {
        return vec![i8::MIN as i32, 0, i8::MAX as i32];
    }
    let midpoint =
        if interval.contains_zero() { 0 } else { interval.lower + (interval.upper - interval.lower) / 2 };
    let mut values = vec![interval.lower, interval.upper, midpoint];
    values.sort_unstable();
    values.dedup();
    values
}

fn clamp_to_i8_byte(v: i32) -> u8 {
    v.clamp(i8::MIN as i32, i8::MAX as i32) as i8 as u8
}

/// Builds the Cartesian product of per-argument representative values into
/// seed test cases. `entry_state` is the abstract interval state at the
/// method's entry block; `arg_types` is the method's parameter signature in
/// order. Array-typed arguments are skipped (spec.md §4.11); the remaining
/// arguments contribute exactly one byte each, clamped to the signed
/// 8-bit range the decoder reads back (spec.md §4.7's byte-sequence
/// parameter format).
pub fn generate(entry_state: &IntervalState, arg_types: &[TypeId], cov_bytes: usize) -> Vec<TestCase> {
    let mut per_arg_values = Vec::new();
    for (idx, ty) in arg_types.iter().enumerate() {
        if ty.is_array() {
            continue;
        }
        let interval = entry_state.vars.get(idx).copied().unwrap_or(Interval::TOP);
        per_arg_values.push(representative_values(interval));
    }

    if per_arg_values.is_empty() {
        return Vec::new();
    }

    let mut tuples: Vec<Vec<i32>> = vec![Vec::new()];
    for values in &per_arg_values {
        let mut next = Vec::with_capacity(tuples.len() * values.len());
        for existing in &tuples {
            for &v in values {
                let mut extended = existing.clone();
                extended.push(v);
                next.push(extended);
            }
        }
        tuples = next;
    }

    tuples
        .into_iter()
        .map(|tuple| TestCase::new(tuple.into_iter().map(clamp_to_i8_byte).collect(), vec![0; cov_bytes]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straddling_interval_yields_three_representatives_including_zero() {
        let values = representative_values(Interval { lower: -5, upper: 10 });
        assert_eq!(values, vec![-5, 0, 10]);
    }

    #[test]
    fn top_interval_yields_the_byte_range_representatives() {
        assert_eq!(representative_values(Interval::TOP), vec![-128, 0, 127]);
    }

    #[test]
    fn bottom_interval_yields_a_single_default() {
        assert_eq!(representative_values(Interval { lower: 5, upper: 0 }), vec![0]);
    }

    #[test]
    fn cartesian_product_covers_every_combination() {
        let state = IntervalState { vars: vec![Interval { lower: 0, upper: 1 }, Interval { lower: -2, upper: 2 }] };
        let cases = generate(&state, &[TypeId::INT, TypeId::INT], 8);
        // arg0: {0,1}; arg1: {-2,0,2} -> 2 * 3 = 6 combinations.
        assert_eq!(cases.len(), 6);
        assert!(cases.iter().all(|tc| tc.data.len() == 2));
    }

    #[test]
    fn array_arguments_are_skipped() {
        let state = IntervalState { vars: vec![Interval::constant(3), Interval::TOP] };
        let cases = generate(&state, &[TypeId::INT, TypeId::INT.array_of()], 8);
        assert!(cases.iter().all(|tc| tc.data.len() == 1));
    }
}
