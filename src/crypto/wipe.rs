//! Constant-time, compiler-opaque zeroing of sensitive buffers.

use zeroize::Zeroize;

/// Overwrites `buf` with zeros in a way the compiler cannot elide.
///
/// Used on every password, KEK, DEK copy and intermediate transient once it
/// is no longer needed.
pub fn wipe<T: Zeroize + ?Sized>(buf: &mut T) {
    buf.zeroize();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wipes_byte_array() {
        let mut buf = [1u8, 2, 3, 4];
        wipe(&mut buf);
        assert_eq!(buf, [0u8; 4]);
    }

    #[test]
    fn wipes_string() {
        let mut s = String::from("correct horse battery staple");
        wipe(&mut s);
        assert!(s.is_empty());
    }
}
