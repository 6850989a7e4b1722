/// Mixed-radix counter over the instantiations of a list of variables.
///
/// ```text
/// cards = [2, 3]  ->  [0,0] [1,0] [0,1] [1,1] [0,2] [1,2]
/// ```
///
/// The first digit varies fastest. An empty `cards` list yields exactly one
/// (empty) instantiation; any zero cardinality yields none.
#[derive(Debug, Clone)]
pub struct Instantiations {
    cards: Vec<usize>,
    current: Option<Vec<usize>>,
}

impl Instantiations {
    pub fn new(cards: impl Into<Vec<usize>>) -> Self {
        let cards = cards.into();
        let current = if cards.iter().any(|&c| c == 0) {
            None
        } else {
            Some(vec![0; cards.len()])
        };
        Self { cards, current }
    }
}

impl Iterator for Instantiations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current.take()?;
        let mut next = current.clone();
        let mut carry = true;
        for (digit, &card) in next.iter_mut().zip(&self.cards) {
            *digit += 1;
            if *digit < card {
                carry = false;
                break;
            }
            *digit = 0;
        }
        if !carry {
            self.current = Some(next);
        }
        Some(current)
    }
}

/// Number of instantiations of the given cardinalities, saturating at `usize::MAX`.
pub fn instantiation_count(cards: &[usize]) -> usize {
    cards.iter().fold(1usize, |acc, &c| acc.saturating_mul(c))
}

/// Roulette-wheel selection.
///
/// `r` must be drawn uniformly from `[0, 1)`; it is scaled by the total weight.
/// Returns `None` when every weight is zero.
pub fn roulette(weights: &[f64], r: f64) -> Option<usize> {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return None;
    }
    let target = r * total;
    let mut acc = 0.0;
    let mut last = None;
    for (i, &w) in weights.iter().enumerate() {
        if w <= 0.0 {
            continue;
        }
        acc += w;
        last = Some(i);
        if target < acc {
            return Some(i);
        }
    }
    // Rounding can leave `target` just above the accumulated sum.
    last
}

/// Absolute-tolerance float comparison.
pub fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() <= eps
}
