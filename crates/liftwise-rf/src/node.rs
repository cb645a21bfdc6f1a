//! Arena nodes of a fitted decision tree and the small typed values they hold.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! index_newtype {
    ($(#[$meta:meta])* $name:ident, $display:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(usize);

        impl $name {
            pub(crate) fn new(index: usize) -> Self {
                Self(index)
            }

            /// Zero-based position.
            #[must_use]
            pub fn index(self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, $display, self.0)
            }
        }
    };
}

index_newtype!(
    /// Predictor column a split tests.
    FeatureIndex,
    "{}"
);
index_newtype!(
    /// Slot in a tree's node vector; the root is `#0`.
    NodeIndex,
    "#{}"
);

/// Gini or entropy impurity of the rows reaching a node.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Impurity(f64);

impl Impurity {
    pub(crate) fn new(value: f64) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Single-class node.
    #[must_use]
    pub fn is_pure(self) -> bool {
        self.0 <= f64::EPSILON
    }
}

impl fmt::Display for Impurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}

/// Interior test or terminal leaf.
///
/// Rows with `sample[feature] <= threshold` descend to `left`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Node {
    Split {
        feature: FeatureIndex,
        threshold: f64,
        left: NodeIndex,
        right: NodeIndex,
        impurity: Impurity,
        n_samples: usize,
        /// `n * parent - n_left * left - n_right * right`, summed into MDI importance.
        impurity_decrease: f64,
    },
    Leaf {
        /// Majority class; the lowest index wins a tie.
        prediction: usize,
        /// Training rows per class, over every declared class.
        class_counts: Vec<usize>,
        impurity: Impurity,
    },
}

impl Node {
    #[must_use]
    pub fn impurity(&self) -> Impurity {
        match self {
            Node::Split { impurity, .. } | Node::Leaf { impurity, .. } => *impurity,
        }
    }

    /// Training rows that reached the node.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        match self {
            Node::Split { n_samples, .. } => *n_samples,
            Node::Leaf { class_counts, .. } => class_counts.iter().sum(),
        }
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    /// Class frequencies of a leaf as probabilities. `None` on a split.
    ///
    /// An empty leaf yields all zeros rather than NaN.
    #[must_use]
    pub fn distribution(&self) -> Option<Vec<f64>> {
        let Node::Leaf { class_counts, .. } = self else {
            return None;
        };
        let total = class_counts.iter().sum::<usize>().max(1) as f64;
        Some(class_counts.iter().map(|&c| c as f64 / total).collect())
    }
}
