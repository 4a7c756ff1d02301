/// Address handling.
///
/// An address is a 20-byte hash, the kind of script it pays to, and the
/// network whose version bytes frame it in Base58Check. Networks are plain
/// configuration values; `Network::mainnet()` and `Network::testnet()` are
/// presets, not the only accepted parameter sets.

use std::fmt;
use std::str::FromStr;

use npw_primitives::base58;
use npw_primitives::ec::PublicKey;

use crate::script::Script;
use crate::ScriptError;

/// Address version bytes and naming for one network.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub name: String,
    /// Version byte of pay-to-public-key-hash addresses.
    pub pubkey_hash: u8,
    /// Version byte of pay-to-script-hash addresses.
    pub script_hash: u8,
    /// Version byte of WIF private keys.
    pub private_key: u8,
}

impl Network {
    /// The npw main network.
    pub fn mainnet() -> Self {
        Network {
            name: "livenet".to_string(),
            pubkey_hash: 0x0d,
            script_hash: 0x05,
            private_key: 0xd4,
        }
    }

    pub fn testnet() -> Self {
        Network {
            name: "testnet".to_string(),
            pubkey_hash: 0x6f,
            script_hash: 0xc4,
            private_key: 0xef,
        }
    }

    /// The address type a version byte denotes on this network.
    pub fn address_type_of(&self, version: u8) -> Option<AddressType> {
        if version == self.pubkey_hash {
            Some(AddressType::PayToPublicKeyHash)
        } else if version == self.script_hash {
            Some(AddressType::PayToScriptHash)
        } else {
            None
        }
    }
}

impl Default for Network {
    fn default() -> Self {
        Network::mainnet()
    }
}

/// The kind of locking script an address pays to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum AddressType {
    PayToPublicKeyHash,
    PayToScriptHash,
}

/// A Base58Check address.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    /// Hash160 of the public key or of the redeem script.
    pub hash: [u8; 20],
    pub address_type: AddressType,
    pub network: Network,
}

impl Address {
    /// Parse an address against the mainnet and testnet presets.
    pub fn from_string(addr: &str) -> Result<Self, ScriptError> {
        Self::from_string_with(addr, &[Network::mainnet(), Network::testnet()])
    }

    /// Parse an address, accepting the version bytes of any given network.
    ///
    /// # Arguments
    /// * `addr` - The Base58Check address string.
    /// * `networks` - Candidate networks, tried in order.
    ///
    /// # Returns
    /// The decoded `Address`, `InvalidAddress` for bad encoding, checksum or
    /// length, or `UnsupportedAddress` if no network claims the version byte.
    pub fn from_string_with(addr: &str, networks: &[Network]) -> Result<Self, ScriptError> {
        let payload = base58::check_decode(addr)
            .map_err(|e| ScriptError::InvalidAddress(format!("{}: {}", addr, e)))?;
        if payload.len() != 21 {
            return Err(ScriptError::InvalidAddress(format!(
                "{}: payload is {} bytes",
                addr,
                payload.len()
            )));
        }

        let version = payload[0];
        let (network, address_type) = networks
            .iter()
            .find_map(|n| n.address_type_of(version).map(|t| (n.clone(), t)))
            .ok_or_else(|| ScriptError::UnsupportedAddress(addr.to_string()))?;

        let mut hash = [0u8; 20];
        hash.copy_from_slice(&payload[1..]);
        Ok(Address { hash, address_type, network })
    }

    pub fn from_public_key_hash(hash: &[u8; 20], network: &Network) -> Self {
        Address {
            hash: *hash,
            address_type: AddressType::PayToPublicKeyHash,
            network: network.clone(),
        }
    }

    /// Pay-to-public-key-hash address of a key in its own encoding.
    pub fn from_public_key(public_key: &PublicKey, network: &Network) -> Self {
        Self::from_public_key_hash(&public_key.hash160(), network)
    }

    pub fn from_script_hash(hash: &[u8; 20], network: &Network) -> Self {
        Address {
            hash: *hash,
            address_type: AddressType::PayToScriptHash,
            network: network.clone(),
        }
    }

    /// Pay-to-script-hash address of a redeem script.
    pub fn from_redeem_script(redeem_script: &Script, network: &Network) -> Self {
        Self::from_script_hash(&redeem_script.script_hash(), network)
    }

    /// The address a locking script pays to, if it is P2PKH or P2SH.
    pub fn from_script(script: &Script, network: &Network) -> Option<Self> {
        if let Some(hash) = script.public_key_hash() {
            Some(Self::from_public_key_hash(&hash, network))
        } else {
            script
                .script_hash_of_output()
                .map(|hash| Self::from_script_hash(&hash, network))
        }
    }

    /// The locking script paying to this address.
    pub fn to_script(&self) -> Script {
        Script::build_address_out(self)
    }

    pub fn version(&self) -> u8 {
        match self.address_type {
            AddressType::PayToPublicKeyHash => self.network.pubkey_hash,
            AddressType::PayToScriptHash => self.network.script_hash,
        }
    }
}

impl fmt::Display for Address {
    /// Display the address as its Base58Check string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut payload = Vec::with_capacity(21);
        payload.push(self.version());
        payload.extend_from_slice(&self.hash);
        write!(f, "{}", base58::check_encode(&payload))
    }
}

impl FromStr for Address {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_string(s)
    }
}

impl serde::Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_string(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    //! Tests for address parsing, encoding and network selection.

    use super::*;
    use npw_primitives::ec::PrivateKey;

    /// Address and key from the npw P2PKH input fixtures.
    const NPW_ADDRESS: &str = "6GhRctxkEzLP8tz3akYech9PMs5J3DZEL9";
    const NPW_WIF: &str = "YMx7NHhRHZr7khqwarzFhgz4tVuuTereTeYRneQxG7eqRAzuHWGq";

    #[test]
    fn test_parse_npw_mainnet_address() {
        let addr = Address::from_string(NPW_ADDRESS).expect("should parse mainnet");
        assert_eq!(addr.network, Network::mainnet());
        assert_eq!(addr.address_type, AddressType::PayToPublicKeyHash);
        assert_eq!(hex::encode(addr.hash), "19438da7d16709643be5abd8df62ca4034a489a7");
        assert_eq!(addr.to_string(), NPW_ADDRESS);
    }

    #[test]
    fn test_address_of_wif_key() {
        let (key, version) = PrivateKey::from_wif(NPW_WIF).unwrap();
        assert_eq!(version, Network::mainnet().private_key);
        let addr = Address::from_public_key(&key.pub_key(), &Network::mainnet());
        assert_eq!(hex::encode(addr.hash), "aa48cd124896ad243298c4d370618f2352b50b57");
        let back = Address::from_string(&addr.to_string()).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn test_testnet_preset() {
        let hash = [0x8fu8; 20];
        let addr = Address::from_public_key_hash(&hash, &Network::testnet());
        let s = addr.to_string();
        assert!(s.starts_with('m') || s.starts_with('n'), "got {}", s);
        assert_eq!(Address::from_string(&s).unwrap().network, Network::testnet());
    }

    #[test]
    fn test_script_hash_address_roundtrip() {
        let redeem = Script::from_asm("OP_1 OP_1 OP_ADD").unwrap();
        let addr = Address::from_redeem_script(&redeem, &Network::mainnet());
        assert_eq!(addr.address_type, AddressType::PayToScriptHash);
        let parsed: Address = addr.to_string().parse().unwrap();
        assert_eq!(parsed, addr);
        assert_eq!(parsed.to_script(), Script::build_script_hash_out(&redeem));
    }

    #[test]
    fn test_custom_network() {
        let net = Network {
            name: "regtest".to_string(),
            pubkey_hash: 0x30,
            script_hash: 0x32,
            private_key: 0xb0,
        };
        let addr = Address::from_public_key_hash(&[1u8; 20], &net);
        let s = addr.to_string();
        assert!(matches!(Address::from_string(&s), Err(ScriptError::UnsupportedAddress(_))));
        assert_eq!(Address::from_string_with(&s, &[net.clone()]).unwrap().network, net);
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(Address::from_string("ADD8E55").is_err());
        assert!(Address::from_string("6GhRctxkEzLP8tz3akYech9PMs5J3DZEL8").is_err());
        assert!(Address::from_string("0OIl").is_err());
    }

    #[test]
    fn test_from_script() {
        let addr = Address::from_string(NPW_ADDRESS).unwrap();
        let script = addr.to_script();
        assert_eq!(Address::from_script(&script, &Network::mainnet()), Some(addr));
        let data = Script::build_data_out(b"x").unwrap();
        assert_eq!(Address::from_script(&data, &Network::mainnet()), None);
    }

    #[test]
    fn test_serde_as_string() {
        let addr = Address::from_string(NPW_ADDRESS).unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", NPW_ADDRESS));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn test_network_from_json() {
        let net: Network = serde_json::from_str(
            r#"{"name":"livenet","pubkeyHash":13,"scriptHash":5,"privateKey":212}"#,
        )
        .unwrap();
        assert_eq!(net, Network::mainnet());
    }
}
