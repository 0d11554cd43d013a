//! The interval abstract domain: lattice operations and transfer functions.
//!
//! Grounded directly on the original `domain_interval.c`. Each lattice
//! pointwise op (join, intersection/meet, widening, narrowing) and each
//! transfer function (assignment, +, -, *, /) is a one-to-one port; the only
//! behavioral change is using saturating arithmetic instead of the
//! original's silent `int` overflow when combining bounds near `i32::MIN`/
//! `i32::MAX`, since unchecked overflow is undefined behavior's cousin in
//! debug Rust (an arithmetic panic) and wrong in release Rust (silent
//! wraparound) either way — saturating towards `TOP` is the closest
//! behavior-preserving fix.

use std::cmp::{max, min};

/// A closed interval `[lower, upper]`. `lower > upper` never occurs;
/// `BOTTOM` is represented by the absence of a variable, not by an empty
/// interval (mirroring the original, where every slot always holds a valid
/// `Interval`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub lower: i32,
    pub upper: i32,
}

impl Interval {
    pub const TOP: Interval = Interval { lower: i32::MIN, upper: i32::MAX };

    pub fn constant(v: i32) -> Interval {
        Interval { lower: v, upper: v }
    }

    pub fn contains_zero(self) -> bool {
        self.lower <= 0 && self.upper >= 0
    }
}

/// The abstract state at one program point: one interval per local variable
/// slot (spec.md §4.5's "vars" vector).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalState {
    pub vars: Vec<Interval>,
}

impl IntervalState {
    pub fn top(num_vars: usize) -> IntervalState {
        IntervalState { vars: vec![Interval::TOP; num_vars] }
    }

    pub fn bottom(num_vars: usize) -> IntervalState {
        IntervalState { vars: vec![Interval { lower: 0, upper: -1 }; num_vars] }
    }

    fn pointwise(&mut self, other: &IntervalState, f: impl Fn(Interval, Interval) -> Interval) -> bool {
        assert_eq!(self.vars.len(), other.vars.len());
        let mut changed = false;
        for (a, b) in self.vars.iter_mut().zip(other.vars.iter()) {
            let combined = f(*a, *b);
            if combined != *a {
                *a = combined;
                changed = true;
            }
        }
        changed
    }

    /// Least upper bound, accumulated in place. Returns whether `self` changed.
    pub fn join(&mut self, other: &IntervalState) -> bool {
        self.pointwise(other, |a, b| Interval { lower: min(a.lower, b.lower), upper: max(a.upper, b.upper) })
    }

    /// Greatest lower bound, accumulated in place.
    pub fn meet(&mut self, other: &IntervalState) -> bool {
        self.pointwise(other, |a, b| Interval { lower: max(a.lower, b.lower), upper: min(a.upper, b.upper) })
    }

    /// Widens `self` towards instability against `other`: any bound that
    /// grew is jumped straight to infinity, guaranteeing termination.
    pub fn widen(&mut self, other: &IntervalState) -> bool {
        self.pointwise(other, |a, b| Interval {
            lower: if b.lower < a.lower { i32::MIN } else { a.lower },
            upper: if b.upper > a.upper { i32::MAX } else { a.upper },
        })
    }

    /// Narrowing is the original's `interval_narrowing`: a plain meet against
    /// the previous iterate, run after widening has stabilized.
    pub fn narrow(&mut self, prev: &IntervalState) -> bool {
        self.meet(prev)
    }
}

fn sat_add(a: i32, b: i32) -> i32 {
    a.saturating_add(b)
}

fn sat_sub(a: i32, b: i32) -> i32 {
    a.saturating_sub(b)
}

fn sat_mul(a: i32, b: i32) -> i32 {
    a.saturating_mul(b)
}

/// `dst := in_state[src]`.
pub fn transfer_assignment(in_state: &IntervalState, dst: usize, src: usize) -> IntervalState {
    let mut out = in_state.clone();
    out.vars[dst] = in_state.vars[src];
    out
}

/// `dst := src1 + src2`, via interval addition.
pub fn transfer_sum(in_state: &IntervalState, dst: usize, src1: usize, src2: usize) -> IntervalState {
    let mut out = in_state.clone();
    let a = in_state.vars[src1];
    let b = in_state.vars[src2];
    out.vars[dst] = Interval { lower: sat_add(a.lower, b.lower), upper: sat_add(a.upper, b.upper) };
    out
}

/// `dst := src1 - src2`.
pub fn transfer_sub(in_state: &IntervalState, dst: usize, src1: usize, src2: usize) -> IntervalState {
    let mut out = in_state.clone();
    let a = in_state.vars[src1];
    let b = in_state.vars[src2];
    out.vars[dst] = Interval { lower: sat_sub(a.lower, b.upper), upper: sat_sub(a.upper, b.lower) };
    out
}

/// `dst := src1 * src2`, taking the min/max of all four corner products.
pub fn transfer_mul(in_state: &IntervalState, dst: usize, src1: usize, src2: usize) -> IntervalState {
    let mut out = in_state.clone();
    let a = in_state.vars[src1];
    let b = in_state.vars[src2];
    let products =
        [sat_mul(a.lower, b.lower), sat_mul(a.lower, b.upper), sat_mul(a.upper, b.lower), sat_mul(a.upper, b.upper)];
    out.vars[dst] = Interval {
        lower: products.iter().copied().min().unwrap(),
        upper: products.iter().copied().max().unwrap(),
    };
    out
}

/// `dst := src1 / src2`. If the divisor interval straddles zero, the result
/// is `TOP` rather than a fault — spec.md routes the concrete
/// divide-by-zero check through the concrete VM; the abstract domain's job
/// is only to report "could be anything" when it can't rule division by
/// zero out.
pub fn transfer_div(in_state: &IntervalState, dst: usize, src1: usize, src2: usize) -> IntervalState {
    let mut out = in_state.clone();
    let a = in_state.vars[src1];
    let b = in_state.vars[src2];

    if b.contains_zero() {
        out.vars[dst] = Interval::TOP;
        return out;
    }

    let candidates = [a.lower / b.lower, a.lower / b.upper, a.upper / b.lower, a.upper / b.upper];
    out.vars[dst] = Interval {
        lower: candidates.iter().copied().min().unwrap(),
        upper: candidates.iter().copied().max().unwrap(),
    };
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(intervals: &[(i32, i32)]) -> IntervalState {
        IntervalState { vars: intervals.iter().map(|&(l, u)| Interval { lower: l, upper: u }).collect() }
    }

    #[test]
    fn join_takes_widest_bounds() {
        let mut a = state(&[(0, 5)]);
        let b = state(&[(-3, 2)]);
        assert!(a.join(&b));
        assert_eq!(a.vars[0], Interval { lower: -3, upper: 5 });
    }

    #[test]
    fn join_reports_no_change_when_already_wider() {
        let mut a = state(&[(-10, 10)]);
        let b = state(&[(0, 1)]);
        assert!(!a.join(&b));
    }

    #[test]
    fn widen_jumps_to_infinity_on_growth() {
        let mut a = state(&[(0, 10)]);
        let b = state(&[(0, 20)]);
        assert!(a.widen(&b));
        assert_eq!(a.vars[0], Interval { lower: 0, upper: i32::MAX });
    }

    #[test]
    fn narrow_is_meet_against_previous() {
        let mut a = state(&[(i32::MIN, i32::MAX)]);
        let prev = state(&[(0, 100)]);
        assert!(a.narrow(&prev));
        assert_eq!(a.vars[0], Interval { lower: 0, upper: 100 });
    }

    #[test]
    fn div_straddling_zero_yields_top() {
        let s = state(&[(10, 10), (-1, 1)]);
        let out = transfer_div(&s, 0, 0, 1);
        assert_eq!(out.vars[0], Interval::TOP);
    }

    #[test]
    fn div_disjoint_from_zero_is_precise() {
        let s = state(&[(10, 20), (2, 5)]);
        let out = transfer_div(&s, 0, 0, 1);
        assert_eq!(out.vars[0], Interval { lower: 2, upper: 10 });
    }

    #[test]
    fn mul_takes_extremal_corner() {
        let s = state(&[(-2, 3), (-4, 1)]);
        let out = transfer_mul(&s, 0, 0, 1);
        // corners: -2*-4=8, -2*1=-2, 3*-4=-12, 3*1=3 -> [-12, 8]
        assert_eq!(out.vars[0], Interval { lower: -12, upper: 8 });
    }

    fn ordered(a: i32, b: i32) -> (i32, i32) {
        (a.min(b), a.max(b))
    }

    #[quickcheck_macros::quickcheck]
    fn join_is_commutative(a0: i32, a1: i32, b0: i32, b1: i32) -> bool {
        let (al, au) = ordered(a0, a1);
        let (bl, bu) = ordered(b0, b1);
        let mut x = state(&[(al, au)]);
        let mut y = state(&[(bl, bu)]);
        let (xb, yb) = (x.clone(), y.clone());
        x.join(&yb);
        y.join(&xb);
        x == y
    }

    #[quickcheck_macros::quickcheck]
    fn join_is_idempotent(a0: i32, a1: i32) -> bool {
        let (al, au) = ordered(a0, a1);
        let mut x = state(&[(al, au)]);
        let snapshot = x.clone();
        x.join(&snapshot);
        x == snapshot
    }

    #[quickcheck_macros::quickcheck]
    fn meet_is_commutative(a0: i32, a1: i32, b0: i32, b1: i32) -> bool {
        let (al, au) = ordered(a0, a1);
        let (bl, bu) = ordered(b0, b1);
        let mut x = state(&[(al, au)]);
        let mut y = state(&[(bl, bu)]);
        let (xb, yb) = (x.clone(), y.clone());
        x.meet(&yb);
        y.meet(&xb);
        x == y
    }

    #[quickcheck_macros::quickcheck]
    fn meet_is_idempotent(a0: i32, a1: i32) -> bool {
        let (al, au) = ordered(a0, a1);
        let mut x = state(&[(al, au)]);
        let snapshot = x.clone();
        x.meet(&snapshot);
        x == snapshot
    }

    #[quickcheck_macros::quickcheck]
    fn widening_is_extensive(a0: i32, a1: i32, b0: i32, b1: i32) -> bool {
        let (al, au) = ordered(a0, a1);
        let (bl, bu) = ordered(b0, b1);
        let mut x = state(&[(al, au)]);
        x.widen(&state(&[(bl, bu)]));
        let r = x.vars[0];
        r.lower <= al && r.upper >= au
    }

    #[quickcheck_macros::quickcheck]
    fn narrowing_is_bounded_by_the_pre_narrow_state(a0: i32, a1: i32, b0: i32, b1: i32) -> bool {
        let (al, au) = ordered(a0, a1);
        let (bl, bu) = ordered(b0, b1);
        let mut x = state(&[(al, au)]);
        x.narrow(&state(&[(bl, bu)]));
        let r = x.vars[0];
        r.lower >= al && r.upper <= au
    }
}
