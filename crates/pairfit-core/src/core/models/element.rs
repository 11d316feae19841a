use super::configuration::ModelError;
use itertools::Itertools;
use std::collections::HashSet;
use std::fmt;

/// Dense index of an atomic species inside an [`ElementTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ElementIndex(usize);

impl ElementIndex {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for ElementIndex {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl fmt::Display for ElementIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unordered pair of elements, normalised so that `first <= second`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementPair {
    first: ElementIndex,
    second: ElementIndex,
}

impl ElementPair {
    pub fn new(a: ElementIndex, b: ElementIndex) -> Self {
        if a <= b {
            Self {
                first: a,
                second: b,
            }
        } else {
            Self {
                first: b,
                second: a,
            }
        }
    }

    #[inline]
    pub fn first(&self) -> ElementIndex {
        self.first
    }

    #[inline]
    pub fn second(&self) -> ElementIndex {
        self.second
    }

    #[inline]
    pub fn is_self_pair(&self) -> bool {
        self.first == self.second
    }

    /// Every unordered pair over `num_elements` species, self pairs included, in
    /// lexicographic order.
    pub fn all(num_elements: usize) -> Vec<ElementPair> {
        (0..num_elements)
            .combinations_with_replacement(2)
            .map(|p| Self::new(ElementIndex::new(p[0]), ElementIndex::new(p[1])))
            .collect()
    }
}

impl fmt::Display for ElementPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.first, self.second)
    }
}

/// Ordered list of the element symbols present in a configuration.
///
/// The position of a symbol in the table is its [`ElementIndex`]; histograms,
/// populations and weighting schemes are all laid out in this order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementTable {
    names: Vec<String>,
}

impl ElementTable {
    pub fn new<I, S>(names: I) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if name.trim().is_empty() {
                return Err(ModelError::EmptyElementName);
            }
            if !seen.insert(name.as_str()) {
                return Err(ModelError::DuplicateElement(name.clone()));
            }
        }
        Ok(Self { names })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, index: ElementIndex) -> Option<&str> {
        self.names.get(index.index()).map(String::as_str)
    }

    pub fn index_of(&self, name: &str) -> Option<ElementIndex> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(ElementIndex::new)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = (ElementIndex, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, n)| (ElementIndex::new(i), n.as_str()))
    }
}
