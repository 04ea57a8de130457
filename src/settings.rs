/// Probability calculation method over the minimal cut sets.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Approximation {
    /// Exact calculation via the binary decision diagram.
    None,
    /// Sum of cut-set probabilities; an upper bound for small probabilities.
    RareEvent,
    /// Minimal cut set upper bound; tighter than rare-event.
    Mcub,
}

/// Knobs of a single analysis run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Maximum size of a reported minimal cut set.
    pub limit_order: usize,
    pub approximation: Approximation,
    /// Apply the CCF substitution map during graph construction.
    pub ccf_analysis: bool,
    pub importance_analysis: bool,
    /// Cap on BDD nodes before the builder gives up.
    pub bdd_node_limit: usize,
    /// Cap on intermediate cut-set products before expansion gives up.
    pub product_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            limit_order: 20,
            approximation: Approximation::None,
            ccf_analysis: false,
            importance_analysis: true,
            bdd_node_limit: 1 << 22,
            product_limit: 1 << 20,
        }
    }
}

impl Settings {
    pub fn limit_order(mut self, limit: usize) -> Self {
        self.limit_order = limit;
        self
    }

    pub fn approximation(mut self, approximation: Approximation) -> Self {
        self.approximation = approximation;
        self
    }

    pub fn ccf_analysis(mut self, on: bool) -> Self {
        self.ccf_analysis = on;
        self
    }

    pub fn importance_analysis(mut self, on: bool) -> Self {
        self.importance_analysis = on;
        self
    }
}
