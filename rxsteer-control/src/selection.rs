use rxsteer_common::{OnlineUnits, UnitId};

/// Cap on the number of units a selection may hold.
pub const MAX_SELECTED_UNITS: usize = 40;

/// A set of processing units preferred by the external balancer for some traffic class.
///
/// Encoded on the wire as a bitmap over the *online position* of each unit: bit `i` stands
/// for the `i`-th online unit in ascending order, whatever its identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitSelection {
    units: Vec<UnitId>,
}

impl UnitSelection {
    /// Builds a selection, or returns the offending count if it exceeds
    /// [`MAX_SELECTED_UNITS`].
    pub fn new(units: impl IntoIterator<Item = UnitId>) -> Result<Self, usize> {
        let mut units: Vec<UnitId> = units.into_iter().collect();
        units.sort_unstable();
        units.dedup();

        if units.len() > MAX_SELECTED_UNITS {
            return Err(units.len());
        }

        Ok(Self { units })
    }

    /// Whether `unit` is selected.
    pub fn contains(&self, unit: UnitId) -> bool {
        self.units.binary_search(&unit).is_ok()
    }

    /// Number of selected units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Selected units in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.units.iter().copied()
    }

    /// Encodes the selected units that are online. Positions past bit 63 cannot be
    /// represented and are left out.
    pub fn to_bitmap(&self, online: &OnlineUnits) -> u64 {
        online
            .iter()
            .enumerate()
            .take(u64::BITS as usize)
            .filter(|(_, unit)| self.contains(*unit))
            .fold(0, |map, (pos, _)| map | (1u64 << pos))
    }

    /// Decodes a bitmap, consuming one bit per online unit. Bits beyond the online units are
    /// ignored.
    pub fn from_bitmap(mut map: u64, online: &OnlineUnits) -> Result<Self, usize> {
        let mut units = Vec::new();
        for unit in online {
            if map & 1 == 1 {
                units.push(*unit);
            }
            map >>= 1;
        }

        Self::new(units)
    }
}
