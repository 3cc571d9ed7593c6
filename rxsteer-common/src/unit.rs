use std::fmt;

/// Identifier of a processing unit (one CPU core, one receive lane).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct UnitId(u32);

impl UnitId {
    /// Wraps a raw unit identifier.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn id(&self) -> u32 {
        self.0
    }

    /// Returns the identifier as an index into per-unit storage.
    #[inline]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for UnitId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit{}", self.0)
    }
}

/// The set of units currently online, iterated in ascending identifier order.
///
/// The position of a unit in this order (not its numeric identifier) is what the
/// control plane bitmaps are keyed on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OnlineUnits {
    units: Vec<UnitId>,
}

impl OnlineUnits {
    /// Builds the set from any collection of identifiers. Duplicates are removed.
    pub fn new(units: impl IntoIterator<Item = UnitId>) -> Self {
        let mut units: Vec<UnitId> = units.into_iter().collect();
        units.sort_unstable();
        units.dedup();
        Self { units }
    }

    /// Units `0..count`, all online.
    pub fn contiguous(count: u32) -> Self {
        Self { units: (0..count).map(UnitId::new).collect() }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Whether `unit` is online.
    pub fn contains(&self, unit: UnitId) -> bool {
        self.units.binary_search(&unit).is_ok()
    }

    /// Returns the online position of `unit`, if it is online.
    pub fn position(&self, unit: UnitId) -> Option<usize> {
        self.units.binary_search(&unit).ok()
    }

    /// Online units in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.units.iter().copied()
    }
}

impl<'a> IntoIterator for &'a OnlineUnits {
    type Item = &'a UnitId;
    type IntoIter = std::slice::Iter<'a, UnitId>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.iter()
    }
}
