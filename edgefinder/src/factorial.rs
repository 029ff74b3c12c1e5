pub trait Factorial {
    fn get(&self, n: u8) -> u128;
}

/// Computes factorials on demand.
#[derive(Default)]
pub struct Calculator;

impl Factorial for Calculator {
    #[inline]
    fn get(&self, n: u8) -> u128 {
        assert!(n <= MAX_N, "{n}! overflows");
        let mut product = 1u128;
        for i in 2..=n {
            product *= i as u128;
        }
        product
    }
}

/// The largest `n` for which `n!` fits in a `u128`.
pub const MAX_N: u8 = 34;

const MAX_ENTRIES: usize = MAX_N as usize + 1;

/// Precomputed factorials up to [`MAX_N`]. Preferred over [`Calculator`] when filling a
/// scoreline grid, where the same handful of factorials is requested hundreds of times.
pub struct Lookup {
    entries: [u128; MAX_ENTRIES],
}
impl Factorial for Lookup {
    #[inline]
    fn get(&self, n: u8) -> u128 {
        assert!(n <= MAX_N, "{n}! overflows");
        self.entries[n as usize]
    }
}

impl Default for Lookup {
    fn default() -> Self {
        let mut entries = [1u128; MAX_ENTRIES];
        for i in 2..MAX_ENTRIES {
            entries[i] = i as u128 * entries[i - 1];
        }
        Self { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn calculator() {
        test_impl(Calculator);
    }

    #[test]
    pub fn lookup() {
        test_impl(Lookup::default());
    }

    fn test_impl(f: impl Factorial) {
        assert_eq!(1, f.get(0));
        assert_eq!(1, f.get(1));
        assert_eq!(2, f.get(2));
        assert_eq!(6, f.get(3));
        assert_eq!(5040, f.get(7));
        assert_eq!(3_628_800, f.get(10));
    }

    #[test]
    pub fn lookup_agrees_with_calculator() {
        let lookup = Lookup::default();
        for n in 0..=MAX_N {
            assert_eq!(Calculator.get(n), lookup.get(n), "mismatch at {n}!");
        }
    }

    #[test]
    #[should_panic = "35! overflows"]
    pub fn calculator_overflow_panics() {
        Calculator.get(35);
    }
}
