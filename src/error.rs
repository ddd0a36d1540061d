/// Errors raised by the link store and the resolver.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Absent link, or an unknown id on mutation.
    #[error("link not found")]
    NotFound,

    #[error("slug '{0}' is already in use")]
    SlugConflict(String),

    #[error("invalid slug: {0}")]
    InvalidSlug(String),

    #[error("invalid target URL: {0}")]
    InvalidUrl(String),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl LinkError {
    /// Validation failures are the caller's fault and safe to show verbatim.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LinkError::SlugConflict(_) | LinkError::InvalidSlug(_) | LinkError::InvalidUrl(_)
        )
    }

    /// Message suitable for an admin flash; store failures stay generic.
    pub fn user_message(&self) -> String {
        match self {
            LinkError::NotFound => "Link not found.".to_owned(),
            LinkError::SlugConflict(_) => "Slug already in use. Please choose another.".to_owned(),
            LinkError::InvalidSlug(reason) => format!("Invalid slug: {reason}."),
            LinkError::InvalidUrl(reason) => format!("Invalid target URL: {reason}."),
            LinkError::Store(_) => "Database error. Please try again.".to_owned(),
        }
    }
}

/// True when a sqlx error is a UNIQUE constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_are_not_shown_verbatim() {
        let err = LinkError::Store(sqlx::Error::RowNotFound);
        assert!(!err.is_validation());
        assert_eq!(err.user_message(), "Database error. Please try again.");
    }

    #[test]
    fn validation_errors_are_flagged() {
        assert!(LinkError::SlugConflict("promo".into()).is_validation());
        assert!(LinkError::InvalidUrl("missing".into()).is_validation());
        assert!(!LinkError::NotFound.is_validation());
        assert_eq!(
            LinkError::SlugConflict("promo".into()).to_string(),
            "slug 'promo' is already in use"
        );
    }
}
