/// Presence tag for a column value.
///
/// `NotSet` columns are left out of INSERT column lists (so the backend can generate
/// them) and never turn into filter leaves.
#[derive(Debug, Default)]
pub enum Passive<T> {
    Set(T),
    #[default]
    NotSet,
}

impl<T> Passive<T> {
    pub fn is_set(&self) -> bool {
        matches!(self, Passive::Set(..))
    }
    pub fn as_option(&self) -> Option<&T> {
        match self {
            Passive::Set(v) => Some(v),
            Passive::NotSet => None,
        }
    }
    pub fn into_option(self) -> Option<T> {
        match self {
            Passive::Set(v) => Some(v),
            Passive::NotSet => None,
        }
    }
}

impl<T: PartialEq> PartialEq for Passive<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Set(lhs), Self::Set(rhs)) => lhs == rhs,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

impl<T: Clone> Clone for Passive<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Set(v) => Self::Set(v.clone()),
            Self::NotSet => Self::NotSet,
        }
    }
}

impl<T> From<T> for Passive<T> {
    fn from(value: T) -> Self {
        Self::Set(value)
    }
}

/// One-to-many association slot, filled only by an explicit preload.
///
/// A slot that was preloaded but matched no children is `Loaded(vec![])`, which is
/// distinguishable from `NotLoaded` through [`Association::is_loaded`].
#[derive(Debug)]
pub enum Association<T> {
    NotLoaded,
    Loaded(Vec<T>),
}

impl<T> Default for Association<T> {
    fn default() -> Self {
        Association::NotLoaded
    }
}

impl<T> Association<T> {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Association::Loaded(..))
    }
    /// The loaded children, empty when not loaded.
    pub fn as_slice(&self) -> &[T] {
        match self {
            Association::Loaded(v) => v,
            Association::NotLoaded => &[],
        }
    }
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }
    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

impl<T: Clone> Clone for Association<T> {
    fn clone(&self) -> Self {
        match self {
            Self::NotLoaded => Self::NotLoaded,
            Self::Loaded(v) => Self::Loaded(v.clone()),
        }
    }
}

impl<T: PartialEq> PartialEq for Association<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Loaded(lhs), Self::Loaded(rhs)) => lhs == rhs,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}
