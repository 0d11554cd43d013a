//! Child mutation (spec.md §4.10 step 2).
//!
//! The original's `mutate` is a documented no-op (`return tc;`), and
//! spec.md explicitly allows a minimum-viable fuzzer to stay at the
//! identity. An identity-only mutator never explores past the seed corpus,
//! though, so this port picks one concrete, recommended-but-not-required
//! strategy: with one mutation applied per call, either flip a random bit
//! in an existing byte, replace a byte with a random one, or grow/shrink
//! the buffer by one byte — chosen uniformly at random, the simplest
//! combination of the three techniques spec.md names (byte-flip, arith,
//! length-change).

use rand::Rng;

pub fn mutate(data: &mut Vec<u8>, rng: &mut impl Rng) {
    if data.is_empty() {
        data.push(rng.gen());
        return;
    }

    match rng.gen_range(0..4) {
        0 => {
            let idx = rng.gen_range(0..data.len());
            let bit = rng.gen_range(0..8);
            data[idx] ^= 1 << bit;
        }
        1 => {
            let idx = rng.gen_range(0..data.len());
            data[idx] = rng.gen();
        }
        2 => data.push(rng.gen()),
        _ => {
            data.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn never_panics_on_empty_input() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut data = Vec::new();
        mutate(&mut data, &mut rng);
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn length_stays_within_one_byte_of_original() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut data = vec![1, 2, 3, 4];
        let before = data.len();
        mutate(&mut data, &mut rng);
        assert!(data.len() as i64 - before as i64 <= 1 && before as i64 - data.len() as i64 <= 1);
    }
}
