use handshape_icp::PointSetError;

/// Error type for pose matching.
#[derive(thiserror::Error, Debug)]
pub enum PoseError {
    /// The input does not have one point per configuration target.
    #[error("Input size {input} does not match configuration size {config}")]
    InvalidArgument {
        /// Number of input points.
        input: usize,
        /// Number of configuration targets.
        config: usize,
    },

    /// The weights do not have one entry per target.
    #[error("{targets} targets but {weights} weights")]
    MismatchedWeights {
        /// Number of targets.
        targets: usize,
        /// Number of weights.
        weights: usize,
    },

    /// The identifiers do not have one entry per target.
    #[error("{targets} targets but {identifiers} identifiers")]
    MismatchedIdentifiers {
        /// Number of targets.
        targets: usize,
        /// Number of identifiers.
        identifiers: usize,
    },

    /// The point-set fit failed.
    #[error(transparent)]
    Solver(#[from] PointSetError),

    /// Error reading or writing a configuration file.
    #[error("Failed to access configuration file")]
    Io(#[from] std::io::Error),

    /// The configuration document is malformed.
    #[error("Failed to (de)serialize configuration")]
    Serialization(#[from] serde_json::Error),
}
