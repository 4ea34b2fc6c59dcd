/// Expression engine errors. Only compilation can fail; evaluation cannot.
#[derive(Debug, thiserror::Error)]
pub enum ExprError {
    #[error("parse error at byte {pos}: {message}")]
    Parse { pos: usize, message: String },
}

impl ExprError {
    pub(crate) fn at(pos: usize, message: impl Into<String>) -> Self {
        ExprError::Parse {
            pos,
            message: message.into(),
        }
    }
}
