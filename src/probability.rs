//! Probability calculations: exact over the BDD, and the rare-event and
//! MCUB closed forms over minimal cut sets.

use std::collections::BTreeSet;

use crate::bdd::Bdd;
use crate::literal::Literal;
use crate::node::Ref;

impl Bdd {
    /// Exact probability of the function rooted at `root`, given per-variable
    /// probabilities (indexed by basic-event index).
    ///
    /// ```text
    /// P(n) = p_v * P(high) + (1 - p_v) * P(low)
    /// ```
    ///
    /// Results are cached on the nodes under a mark that flips with every
    /// full evaluation, so a later call with different probabilities never
    /// sees stale values. A complement edge contributes `1 - P`.
    pub fn probability(&mut self, root: Ref, probs: &[f64]) -> f64 {
        let mark = self.flip_mark();
        let p = self.node_probability(root.index(), mark, probs);
        if root.is_negated() {
            1.0 - p
        } else {
            p
        }
    }

    fn node_probability(&mut self, index: usize, mark: bool, probs: &[f64]) -> f64 {
        if index == 1 {
            return 1.0; // The terminal in regular form.
        }
        if self.node(index).mark == mark {
            return self.node(index).prob;
        }
        let (variable, low, high) = {
            let node = self.node(index);
            (node.variable, node.low, node.high)
        };
        debug_assert!(!high.is_negated());
        let p_high = self.node_probability(high.index(), mark, probs);
        let p_low = self.node_probability(low.index(), mark, probs);
        let p_low = if low.is_negated() { 1.0 - p_low } else { p_low };
        let p_var = probs[variable as usize];
        let p = p_var * p_high + (1.0 - p_var) * p_low;
        let node = self.node_mut(index);
        node.mark = mark;
        node.prob = p;
        p
    }
}

/// Probability of one product: independent members multiply, a complemented
/// literal contributes `1 - p`.
pub fn product_probability(product: &BTreeSet<Literal>, probs: &[f64]) -> f64 {
    product
        .iter()
        .map(|lit| {
            let p = probs[lit.index() as usize];
            if lit.is_negated() {
                1.0 - p
            } else {
                p
            }
        })
        .product()
}

/// Rare-event approximation: the sum of product probabilities.
pub fn rare_event(products: &[BTreeSet<Literal>], probs: &[f64]) -> f64 {
    products.iter().map(|product| product_probability(product, probs)).sum()
}

/// Minimal cut set upper bound:
///
/// ```text
/// P ≈ 1 - Π (1 - P(product))
/// ```
pub fn mcub(products: &[BTreeSet<Literal>], probs: &[f64]) -> f64 {
    1.0 - products
        .iter()
        .map(|product| 1.0 - product_probability(product, probs))
        .product::<f64>()
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn product(lits: &[i32]) -> BTreeSet<Literal> {
        lits.iter().map(|&value| Literal::new(value)).collect()
    }

    #[test]
    fn test_exact_single_variable() {
        let mut bdd = Bdd::new();
        let x = bdd.mk_var(1);
        let probs = vec![0.0, 0.3];
        assert!((bdd.probability(x, &probs) - 0.3).abs() < 1e-12);
        assert!((bdd.probability(-x, &probs) - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_exact_and_or() {
        let mut bdd = Bdd::new();
        let x = bdd.mk_var(1);
        let y = bdd.mk_var(2);
        let and = bdd.apply_and(x, y);
        let or = bdd.apply_or(x, y);
        let probs = vec![0.0, 0.2, 0.5];
        assert!((bdd.probability(and, &probs) - 0.1).abs() < 1e-12);
        assert!((bdd.probability(or, &probs) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_mark_invalidates_cache() {
        let mut bdd = Bdd::new();
        let x = bdd.mk_var(1);
        let y = bdd.mk_var(2);
        let f = bdd.apply_and(x, y);
        let p1 = bdd.probability(f, &[0.0, 0.2, 0.5]);
        let p2 = bdd.probability(f, &[0.0, 1.0, 0.5]);
        let p3 = bdd.probability(f, &[0.0, 0.2, 0.5]);
        assert!((p1 - 0.1).abs() < 1e-12);
        assert!((p2 - 0.5).abs() < 1e-12);
        assert!((p1 - p3).abs() < 1e-12);
    }

    #[test]
    fn test_xor_probability() {
        let mut bdd = Bdd::new();
        let x = bdd.mk_var(1);
        let y = bdd.mk_var(2);
        // x XOR y = (x AND ~y) OR (~x AND y)
        let left = bdd.apply_and(x, -y);
        let right = bdd.apply_and(-x, y);
        let xor = bdd.apply_or(left, right);
        let probs = vec![0.0, 0.1, 0.2];
        assert!((bdd.probability(xor, &probs) - 0.26).abs() < 1e-12);
    }

    #[test]
    fn test_product_probability() {
        let probs = vec![0.0, 0.2, 0.5];
        assert!((product_probability(&product(&[1, 2]), &probs) - 0.1).abs() < 1e-12);
        assert!((product_probability(&product(&[1, -2]), &probs) - 0.1).abs() < 1e-12);
        assert!((product_probability(&product(&[-1]), &probs) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_bounds_ordering() {
        // p_rare >= p_mcub >= p_exact for a two-cut-set function.
        let mut bdd = Bdd::new();
        let products = vec![product(&[1, 2]), product(&[1, 3])];
        let probs = vec![0.0, 0.1, 0.2, 0.3];

        let x1 = bdd.mk_var(1);
        let x2 = bdd.mk_var(2);
        let x3 = bdd.mk_var(3);
        let c1 = bdd.apply_and(x1, x2);
        let c2 = bdd.apply_and(x1, x3);
        let f = bdd.apply_or(c1, c2);

        let p_exact = bdd.probability(f, &probs);
        let p_rare = rare_event(&products, &probs);
        let p_mcub = mcub(&products, &probs);
        assert!(p_rare >= p_mcub);
        assert!(p_mcub >= p_exact - 1e-12);
        assert!(p_rare >= p_exact);
        // Exact: P(x1 (x2 | x3)) = 0.1 * (1 - 0.8*0.7) = 0.044
        assert!((p_exact - 0.044).abs() < 1e-12);
    }
}
