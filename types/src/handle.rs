//! Opaque byte payloads exchanged with the ledger and the encryption service.
//!
//! None of these are interpreted locally. They are carried from one gateway
//! to the other and displayed as hex.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TypeError;

macro_rules! opaque_bytes {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(Vec<u8>);

        impl $name {
            pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
                Self(bytes.into())
            }

            /// Parse from a hex string, with or without a `0x` prefix.
            pub fn from_hex(s: &str) -> Result<Self, TypeError> {
                let body = s.strip_prefix("0x").unwrap_or(s);
                hex::decode(body)
                    .map(Self)
                    .map_err(|e| TypeError::InvalidHex(e.to_string()))
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(&self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let head = &self.0[..self.0.len().min(4)];
                write!(f, "{}({}..)", stringify!($name), hex::encode(head))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }
    };
}

opaque_bytes!(
    /// The ledger's reference to a stored ciphertext.
    EncryptedHandle
);

opaque_bytes!(
    /// An encrypted input produced client-side, ready for submission.
    Ciphertext
);

opaque_bytes!(
    /// Validity proof accompanying an encrypted input.
    InputProof
);

opaque_bytes!(
    /// Proof that a set of clear values is the correct decryption of their handles.
    DecryptionProof
);

opaque_bytes!(
    /// Clear values in the ledger's wire encoding, as expected by the verification call.
    ClearValuesEncoded
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_accepts_optional_prefix() {
        let a = EncryptedHandle::from_hex("0xdeadbeef").unwrap();
        let b = EncryptedHandle::from_hex("deadbeef").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_hex(), "0xdeadbeef");
    }

    #[test]
    fn invalid_hex_is_rejected() {
        assert!(matches!(
            Ciphertext::from_hex("0xzz"),
            Err(TypeError::InvalidHex(_))
        ));
    }

    #[test]
    fn debug_shows_only_prefix() {
        let proof = DecryptionProof::new(vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(format!("{proof:?}"), "DecryptionProof(01020304..)");
    }
}
