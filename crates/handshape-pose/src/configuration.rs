use glam::Vec3;

use crate::PoseError;

/// A named hand pose: target points with a weight each.
///
/// Targets and weights always have the same length. Optional identifiers, one per target,
/// label the points (for example joint names) and are carried through persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseConfiguration {
    targets: Vec<Vec3>,
    weights: Vec<f32>,
    identifiers: Option<Vec<String>>,
}

impl PoseConfiguration {
    /// Creates a configuration from parallel arrays of targets and weights.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::MismatchedWeights`] if the lengths differ.
    pub fn new(targets: Vec<Vec3>, weights: Vec<f32>) -> Result<Self, PoseError> {
        if targets.len() != weights.len() {
            return Err(PoseError::MismatchedWeights {
                targets: targets.len(),
                weights: weights.len(),
            });
        }
        Ok(Self {
            targets,
            weights,
            identifiers: None,
        })
    }

    /// Creates a configuration with every weight set to one.
    pub fn uniform(targets: Vec<Vec3>) -> Self {
        let weights = vec![1.0; targets.len()];
        Self {
            targets,
            weights,
            identifiers: None,
        }
    }

    /// Attaches one identifier per target.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::MismatchedIdentifiers`] if the lengths differ.
    pub fn with_identifiers(mut self, identifiers: Vec<String>) -> Result<Self, PoseError> {
        if identifiers.len() != self.targets.len() {
            return Err(PoseError::MismatchedIdentifiers {
                targets: self.targets.len(),
                identifiers: identifiers.len(),
            });
        }
        self.identifiers = Some(identifiers);
        Ok(self)
    }

    /// The target points.
    pub fn targets(&self) -> &[Vec3] {
        &self.targets
    }

    /// The per-target weights.
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// The per-target identifiers, if any.
    pub fn identifiers(&self) -> Option<&[String]> {
        self.identifiers.as_deref()
    }

    /// Number of targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether there are no targets.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
