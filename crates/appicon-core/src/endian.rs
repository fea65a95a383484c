//! Fixed-width field reads over byte slices.

/// Byte order of a multi-byte field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    Little,
    Big,
}

fn field<const N: usize>(buf: &[u8], offset: usize) -> Option<[u8; N]> {
    let end = offset.checked_add(N)?;
    buf.get(offset..end)?.try_into().ok()
}

impl Endian {
    /// Reads a `u16` at `offset`, or `None` if the slice is too short.
    pub fn read_u16(self, buf: &[u8], offset: usize) -> Option<u16> {
        let raw = field::<2>(buf, offset)?;
        Some(match self {
            Endian::Little => u16::from_le_bytes(raw),
            Endian::Big => u16::from_be_bytes(raw),
        })
    }

    pub fn read_u32(self, buf: &[u8], offset: usize) -> Option<u32> {
        let raw = field::<4>(buf, offset)?;
        Some(match self {
            Endian::Little => u32::from_le_bytes(raw),
            Endian::Big => u32::from_be_bytes(raw),
        })
    }

    pub fn read_u64(self, buf: &[u8], offset: usize) -> Option<u64> {
        let raw = field::<8>(buf, offset)?;
        Some(match self {
            Endian::Little => u64::from_le_bytes(raw),
            Endian::Big => u64::from_be_bytes(raw),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_both_orders() {
        let buf = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        assert_eq!(Endian::Little.read_u16(&buf, 0), Some(0x0201));
        assert_eq!(Endian::Big.read_u16(&buf, 0), Some(0x0102));
        assert_eq!(Endian::Little.read_u32(&buf, 4), Some(0x0807_0605));
        assert_eq!(Endian::Big.read_u32(&buf, 4), Some(0x0506_0708));
        assert_eq!(Endian::Little.read_u64(&buf, 0), Some(0x0807_0605_0403_0201));
        assert_eq!(Endian::Big.read_u64(&buf, 0), Some(0x0102_0304_0506_0708));
    }

    #[test]
    fn test_short_reads_are_none() {
        let buf = [0u8; 6];
        assert_eq!(Endian::Little.read_u32(&buf, 3), None);
        assert_eq!(Endian::Big.read_u64(&buf, 0), None);
        assert_eq!(Endian::Little.read_u16(&buf, usize::MAX), None);
        assert_eq!(Endian::Little.read_u16(&buf, 4), Some(0));
    }
}
