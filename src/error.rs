pub type GanvizResult<T> = Result<T, GanvizError>;

#[derive(thiserror::Error, Debug)]
pub enum GanvizError {
    #[error("invalid shape: {0}")]
    InvalidShape(String),

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GanvizError {
    pub fn invalid_shape(msg: impl Into<String>) -> Self {
        Self::InvalidShape(msg.into())
    }

    pub fn shape_mismatch(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }

    pub fn unsupported_format(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            GanvizError::invalid_shape("x")
                .to_string()
                .contains("invalid shape:")
        );
        assert!(
            GanvizError::shape_mismatch("x")
                .to_string()
                .contains("shape mismatch:")
        );
        assert!(
            GanvizError::unsupported_format("x")
                .to_string()
                .contains("unsupported format:")
        );
        assert!(
            GanvizError::encode("x")
                .to_string()
                .contains("encode error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = GanvizError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
