use std::fmt;
use tessera_primitives::ScalarKind;

///
/// ValueType
///
/// Target/source type descriptor used by converter resolution.
/// `List` and `Set` indicate multiplicity and select the collection
/// resolution path; everything else resolves through scalar readers.
///

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum ValueType {
    Any,
    List(Box<Self>),
    Scalar(ScalarKind),
    Set(Box<Self>),
}

impl ValueType {
    #[must_use]
    pub fn list_of(element: Self) -> Self {
        Self::List(Box::new(element))
    }

    #[must_use]
    pub fn set_of(element: Self) -> Self {
        Self::Set(Box::new(element))
    }

    /// True when the descriptor asks for a container rather than a scalar.
    #[must_use]
    pub const fn is_multiple(&self) -> bool {
        matches!(self, Self::List(_) | Self::Set(_))
    }

    #[must_use]
    pub const fn scalar(&self) -> Option<ScalarKind> {
        if let Self::Scalar(kind) = self {
            Some(*kind)
        } else {
            None
        }
    }

    /// Element hint for container descriptors.
    #[must_use]
    pub fn element(&self) -> Option<&Self> {
        match self {
            Self::List(element) | Self::Set(element) => Some(element),
            _ => None,
        }
    }

    /// Whether a value already described by `self` can be handed out as
    /// `target` without any conversion.
    #[must_use]
    pub fn satisfies(&self, target: &Self) -> bool {
        match (self, target) {
            (_, Self::Any) => true,
            (Self::Scalar(a), Self::Scalar(b)) => a == b,
            (Self::List(a), Self::List(b)) => a.satisfies(b),
            (Self::Set(a), Self::Set(b) | Self::List(b)) => a.satisfies(b),
            _ => false,
        }
    }
}

impl From<ScalarKind> for ValueType {
    fn from(kind: ScalarKind) -> Self {
        Self::Scalar(kind)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("Any"),
            Self::List(element) => write!(f, "List<{element}>"),
            Self::Scalar(kind) => write!(f, "{kind}"),
            Self::Set(element) => write!(f, "Set<{element}>"),
        }
    }
}
