use std::fmt;

/// Describes a problem with a specific field of a policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub path: String,
    pub kind: FieldErrorKind,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldErrorKind {
    Required,
    Invalid(String),
    Forbidden,
    NotSupported,
}

// === impl FieldError ===

impl FieldError {
    pub fn required(path: impl ToString, detail: impl ToString) -> Self {
        Self::new(path, FieldErrorKind::Required, detail)
    }

    pub fn invalid(path: impl ToString, value: impl ToString, detail: impl ToString) -> Self {
        Self::new(path, FieldErrorKind::Invalid(value.to_string()), detail)
    }

    pub fn forbidden(path: impl ToString, detail: impl ToString) -> Self {
        Self::new(path, FieldErrorKind::Forbidden, detail)
    }

    pub fn not_supported(path: impl ToString, detail: impl ToString) -> Self {
        Self::new(path, FieldErrorKind::NotSupported, detail)
    }

    fn new(path: impl ToString, kind: FieldErrorKind, detail: impl ToString) -> Self {
        Self {
            path: path.to_string(),
            kind,
            detail: detail.to_string(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.path)?;
        match &self.kind {
            FieldErrorKind::Required => f.write_str("Required value")?,
            FieldErrorKind::Invalid(value) => write!(f, "Invalid value: {value:?}")?,
            FieldErrorKind::Forbidden => f.write_str("Forbidden")?,
            FieldErrorKind::NotSupported => f.write_str("Unsupported value")?,
        }
        if !self.detail.is_empty() {
            write!(f, ": {}", self.detail)?;
        }
        Ok(())
    }
}

/// Renders a list of field errors as a single line: a lone error is shown as
/// is, several are bracketed and comma-separated.
pub fn aggregate(errors: &[FieldError]) -> String {
    match errors {
        [] => String::new(),
        [error] => error.to_string(),
        errors => {
            let errors = errors.iter().map(ToString::to_string).collect::<Vec<_>>();
            format!("[{}]", errors.join(", "))
        }
    }
}
