use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// An elbow arrow update supplied a point array that neither matches
    /// the arrow's current point count nor contains exactly the two
    /// endpoints. Interior points cannot be inserted manually.
    #[error(
        "invalid elbow arrow point update: got {got} points, expected {expected} or exactly 2"
    )]
    InvalidPointUpdate { expected: usize, got: usize },

    /// A fixed segment was supplied that is not axis-aligned.
    #[error("fixed segment {index} is not horizontal or vertical")]
    SkewedFixedSegment { index: usize },

    #[error("config error: {0}")]
    Config(String),
}
