use std::fmt;
use std::str::FromStr;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;

/// A parsed account credential.
///
/// The private key is parsed once at startup and never stored or printed as a
/// string; `Debug` only shows the address.
#[derive(Clone)]
pub struct Credential {
    signer: PrivateKeySigner,
}

impl Credential {
    /// Parse a hex-encoded private key (with or without `0x` prefix).
    pub fn from_hex(private_key: &str) -> anyhow::Result<Self> {
        let trimmed = private_key.trim();
        let hex = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let signer = PrivateKeySigner::from_str(hex)?;
        Ok(Self { signer })
    }

    /// The account address derived from the key.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Borrow the local signer (needed to register with the provider wallet).
    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}
