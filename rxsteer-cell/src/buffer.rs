use bytes::Bytes;
use rxsteer_common::constants::ETH_HLEN;

/// A received frame plus the metadata the cells need.
///
/// Deliberately not `Clone`: a buffer is consumed exactly once, by a cell queue, the slow
/// path or a drop. Use [`PacketBuffer::share`] to get a second handle; both are then marked
/// cloned and bypass the cells.
#[derive(Debug)]
pub struct PacketBuffer {
    /// Raw bytes from the start of the headroom.
    data: Bytes,
    /// Offset of the Ethernet header in `data`.
    mac_header: usize,
    /// Set once by the classifier before enqueue.
    high_priority: Option<bool>,
    /// Whether another owner holds a handle to the same bytes.
    cloned: bool,
}

impl PacketBuffer {
    /// Wraps `data` with its Ethernet header at `mac_header`.
    pub fn new(data: impl Into<Bytes>, mac_header: usize) -> Self {
        Self { data: data.into(), mac_header, high_priority: None, cloned: false }
    }

    /// A buffer whose Ethernet header is at offset 0.
    pub fn from_frame(frame: impl Into<Bytes>) -> Self {
        Self::new(frame, 0)
    }

    #[inline]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn mac_header(&self) -> usize {
        self.mac_header
    }

    #[inline]
    pub fn network_offset(&self) -> usize {
        self.mac_header.saturating_add(ETH_HLEN)
    }

    /// Returns a second handle to the same bytes and marks both as cloned.
    pub fn share(&mut self) -> Self {
        self.cloned = true;
        Self {
            data: self.data.clone(),
            mac_header: self.mac_header,
            high_priority: self.high_priority,
            cloned: true,
        }
    }

    #[inline]
    pub fn is_cloned(&self) -> bool {
        self.cloned
    }

    /// Whether the buffer was tagged high priority. Untagged buffers are normal priority.
    #[inline]
    pub fn is_high_priority(&self) -> bool {
        self.high_priority.unwrap_or(false)
    }

    /// The priority tag, or `None` if the buffer was never classified.
    #[inline]
    pub fn priority_tag(&self) -> Option<bool> {
        self.high_priority
    }

    /// Caches the classification result. Only the first tag sticks.
    pub(crate) fn tag(&mut self, high_priority: bool) {
        debug_assert!(self.high_priority.is_none(), "buffer classified twice");
        self.high_priority.get_or_insert(high_priority);
    }

    /// Consumes the buffer, returning its bytes.
    pub fn into_data(self) -> Bytes {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_marks_both_handles() {
        let mut a = PacketBuffer::new(vec![0u8; 64], 2);
        assert!(!a.is_cloned());

        let b = a.share();
        assert!(a.is_cloned());
        assert!(b.is_cloned());
        assert_eq!(b.mac_header(), 2);
        assert_eq!(b.network_offset(), 16);
        assert_eq!(a.data(), b.data());
    }

    #[test]
    fn tag_is_cached() {
        let mut buf = PacketBuffer::from_frame(vec![0u8; 10]);
        assert_eq!(buf.priority_tag(), None);
        assert!(!buf.is_high_priority());

        buf.tag(true);
        assert_eq!(buf.priority_tag(), Some(true));
        assert!(buf.is_high_priority());
    }
}
