#![forbid(unsafe_code)]

pub mod chain;

pub mod ids {
    /// Opaque revision token, e.g. `84b29e2ae377`.
    #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct RevisionId(String);

    impl RevisionId {
        pub fn as_str(&self) -> &str {
            &self.0
        }

        pub fn into_string(self) -> String {
            self.0
        }

        pub fn try_new(value: impl Into<String>) -> Result<Self, RevisionIdError> {
            let value = value.into();
            validate_revision_id(&value)?;
            Ok(Self(value))
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum RevisionIdError {
        Empty,
        TooLong,
        InvalidFirstChar,
        InvalidChar { ch: char, index: usize },
    }

    impl RevisionIdError {
        pub fn message(&self) -> &'static str {
            match self {
                Self::Empty => "revision id must not be empty",
                Self::TooLong => "revision id is too long",
                Self::InvalidFirstChar => "revision id must start with an ASCII alphanumeric",
                Self::InvalidChar { .. } => "revision id contains an invalid character",
            }
        }
    }

    fn validate_revision_id(value: &str) -> Result<(), RevisionIdError> {
        if value.is_empty() {
            return Err(RevisionIdError::Empty);
        }
        if value.len() > 64 {
            return Err(RevisionIdError::TooLong);
        }
        let mut chars = value.chars();
        let Some(first) = chars.next() else {
            return Err(RevisionIdError::Empty);
        };
        if !first.is_ascii_alphanumeric() {
            return Err(RevisionIdError::InvalidFirstChar);
        }
        for (index, ch) in value.chars().enumerate() {
            if index == 0 {
                continue;
            }
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                continue;
            }
            return Err(RevisionIdError::InvalidChar { ch, index });
        }
        Ok(())
    }

}
