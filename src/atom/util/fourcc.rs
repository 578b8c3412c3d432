use derive_more::Deref;
use std::fmt;

#[derive(Clone, Copy, Deref, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const fn new(value: &[u8; 4]) -> Self {
        FourCC(*value)
    }

    pub fn into_bytes(self) -> [u8; 4] {
        self.0
    }

    /// Builds a [`FourCC`] from a 4 character string, mapping each char to a single byte (Latin-1).
    pub fn from_latin1(value: &str) -> Option<Self> {
        let mut out = [0u8; 4];
        let mut chars = value.chars();
        for byte in out.iter_mut() {
            let c = chars.next()?;
            *byte = u8::try_from(u32::from(c)).ok()?;
        }
        if chars.next().is_some() {
            return None;
        }
        Some(FourCC(out))
    }
}

impl From<[u8; 4]> for FourCC {
    fn from(value: [u8; 4]) -> Self {
        FourCC(value)
    }
}

impl From<&[u8; 4]> for FourCC {
    fn from(value: &[u8; 4]) -> Self {
        FourCC(*value)
    }
}

impl PartialEq<&[u8; 4]> for FourCC {
    fn eq(&self, other: &&[u8; 4]) -> bool {
        &self.0 == *other
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            std::str::from_utf8(&self.0)
                .map(|s| s.to_owned())
                .unwrap_or_else(|_| convert_mac_roman_to_utf8(&self.0))
        )
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC({})", self)
    }
}

fn convert_mac_roman_to_utf8(bytes: &[u8]) -> String {
    let mut result = String::new();
    for &byte in bytes {
        match byte {
            0xA9 => result.push('©'),
            0xAE => result.push('®'),
            0x99 => result.push('™'),
            b if b.is_ascii() => result.push(b as char),
            _ => result.push('�'),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_latin1() {
        assert_eq!(FourCC::from_latin1("moov"), Some(FourCC::new(b"moov")));
        assert_eq!(FourCC::from_latin1("©nam"), Some(FourCC([0xA9, b'n', b'a', b'm'])));
        assert_eq!(FourCC::from_latin1("moo"), None);
        assert_eq!(FourCC::from_latin1("moovv"), None);
        assert_eq!(FourCC::from_latin1("mo€v"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(FourCC::new(b"trak").to_string(), "trak");
        assert_eq!(FourCC([0xA9, b'd', b'a', b'y']).to_string(), "©day");
    }
}
