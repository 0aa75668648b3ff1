// Primitives - Fundamental devnet types
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Universal hash (Blake3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash([u8; 32]);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hash arbitrary data with Blake3
    pub fn hash(data: &[u8]) -> Self {
        let hash = blake3::hash(data);
        Hash(*hash.as_bytes())
    }

    /// Short form for log lines
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl From<[u8; 32]> for Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }
}

impl FromStr for Hash {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Hash(decode_fixed::<32>(s)?))
    }
}

/// 20-byte account or contract address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Address of an externally owned account: last 20 bytes of blake3(public key)
    pub fn from_public_key(public_key: &[u8; 32]) -> Self {
        Self::from_digest(Hash::hash(public_key))
    }

    /// Address assigned to a contract created by `deployer` at `nonce`
    pub fn contract(deployer: &Address, nonce: Nonce) -> Self {
        let mut data = Vec::with_capacity(28);
        data.extend_from_slice(&deployer.0);
        data.extend_from_slice(&nonce.to_le_bytes());
        Self::from_digest(Hash::hash(&data))
    }

    fn from_digest(digest: Hash) -> Self {
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest.as_bytes()[12..]);
        Address(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }
}

impl FromStr for Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Address(decode_fixed::<20>(s)?))
    }
}

// Addresses and hashes travel as 0x-prefixed hex strings, both over JSON-RPC and
// inside the bytes that get signed.
macro_rules! hex_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_serde!(Hash);
hex_serde!(Address);

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], ParseError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).map_err(|e| ParseError::InvalidHex(e.to_string()))?;
    if bytes.len() != N {
        return Err(ParseError::InvalidLength {
            expected: N,
            got: bytes.len(),
        });
    }
    let mut arr = [0u8; N];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

/// Hex parsing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    #[error("Expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },
}

/// Block number
pub type BlockNumber = u64;

/// Unix timestamp in seconds
pub type Timestamp = u64;

/// Amount in base units (wei for the native currency, token base units for contracts)
pub type Balance = u128;

/// Nonce to prevent replay
pub type Nonce = u64;

/// Gas units
pub type Gas = u64;

/// Monetary constants
pub const GWEI: Balance = 1_000_000_000; // 10^9
pub const ETHER: Balance = 1_000_000_000_000_000_000; // 10^18

/// Base units per whole token; granularities must divide it
pub const UNIT: Balance = ETHER;

/// Pre-funded balance of every dev account
pub const DEFAULT_ACCOUNT_BALANCE: Balance = 100 * ETHER;

/// Gas price used when a request does not name one
pub const DEFAULT_GAS_PRICE: Balance = 20 * GWEI;

/// Gas allowance used when a request does not name one
pub const DEFAULT_TX_GAS: Gas = 90_000;

/// Block gas limit when the node is started without one
pub const DEFAULT_BLOCK_GAS_LIMIT: Gas = 6_721_975;

/// Chain id reported by `eth_chainId` / `net_version`
pub const DEV_CHAIN_ID: u64 = 1337;

/// Balances travel as decimal strings: JSON numbers cannot hold every u128.
pub mod balance_str {
    use super::Balance;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Balance, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Balance, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(n as Balance),
            Raw::Text(s) => s.parse::<Balance>().map_err(serde::de::Error::custom),
        }
    }

    pub mod option {
        use super::Balance;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<Balance>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => serializer.serialize_some(&v.to_string()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Balance>, D::Error> {
            #[derive(Deserialize)]
            struct Wrapper(#[serde(with = "super")] Balance);

            let value: Option<Wrapper> = Option::deserialize(deserializer)?;
            Ok(value.map(|Wrapper(v)| v))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        let data = b"Reference Token";
        assert_eq!(Hash::hash(data), Hash::hash(data));
        assert_ne!(Hash::hash(data), Hash::hash(b"XRT"));
    }

    #[test]
    fn test_units() {
        assert_eq!(ETHER, 1_000_000_000 * GWEI);
        assert_eq!(UNIT % (UNIT / 100), 0);
    }

    #[test]
    fn test_address_roundtrip_display() {
        let addr = Address::from_bytes([0xab; 20]);
        let text = addr.to_string();
        assert_eq!(text.len(), 42);
        assert_eq!(text.parse::<Address>().unwrap(), addr);
    }

    #[test]
    fn test_address_parse_errors() {
        assert!(matches!(
            "0x1234".parse::<Address>(),
            Err(ParseError::InvalidLength { expected: 20, got: 2 })
        ));
        assert!(matches!("0xzz".parse::<Address>(), Err(ParseError::InvalidHex(_))));
    }

    #[test]
    fn test_contract_address_depends_on_nonce() {
        let deployer = Address::from_bytes([1; 20]);
        assert_ne!(Address::contract(&deployer, 0), Address::contract(&deployer, 1));
        assert_eq!(Address::contract(&deployer, 7), Address::contract(&deployer, 7));
    }

    #[test]
    fn test_balance_str_accepts_numbers_and_strings() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(with = "balance_str")]
            amount: Balance,
        }

        let a: Holder = serde_json::from_str(r#"{"amount":"10000000000000000000"}"#).unwrap();
        assert_eq!(a.amount, 10 * ETHER);
        let b: Holder = serde_json::from_str(r#"{"amount":42}"#).unwrap();
        assert_eq!(b.amount, 42);
    }
}
