//! Combinatorics.

/// Decodes a `combination` index into per-dimension `ordinals`, treating the dimensions as the
/// digits of a mixed-radix number with the given `cardinalities`. The first dimension varies
/// fastest.
pub fn pick(cardinalities: &[usize], combination: u64, ordinals: &mut [usize]) {
    let mut residual = combination;
    for (index, &cardinality) in cardinalities.iter().enumerate() {
        let cardinality = cardinality as u64;
        let (quotient, remainder) = (residual / cardinality, residual % cardinality);
        residual = quotient;
        ordinals[index] = remainder as usize;
    }
}

pub fn count_combinations(cardinalities: &[usize]) -> u64 {
    cardinalities.iter().product::<usize>() as u64
}

/// Enumerates every point of a discrete grid.
pub struct Combinator<'a> {
    cardinalities: &'a [usize],
    combinations: u64,
}
impl<'a> Combinator<'a> {
    pub fn new(cardinalities: &'a [usize]) -> Self {
        let combinations = count_combinations(cardinalities);
        Self {
            cardinalities,
            combinations,
        }
    }

    pub fn combinations(&self) -> u64 {
        self.combinations
    }
}

impl<'a> IntoIterator for Combinator<'a> {
    type Item = Vec<usize>;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        Self::IntoIter {
            combinator: self,
            combination: 0,
        }
    }
}

pub struct Iter<'a> {
    combinator: Combinator<'a>,
    combination: u64,
}
impl<'a> Iterator for Iter<'a> {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.combination != self.combinator.combinations {
            let mut ordinals = vec![0; self.combinator.cardinalities.len()];
            pick(
                self.combinator.cardinalities,
                self.combination,
                &mut ordinals,
            );
            self.combination += 1;
            Some(ordinals)
        } else {
            None
        }
    }
}
