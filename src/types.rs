//! Primitive LoRaWAN value types: keys, identifiers, version strings and the
//! MHDR enums. Multi-byte identifiers are little-endian on the wire; they are
//! stored here in canonical (display) byte order, reversed at parse time.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// An AES-128 session or root key, supplied as 32 hex characters.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Aes128Key(pub [u8; 16]);

impl Aes128Key {
    /// Parse a key option, attributing failures to the named flag.
    pub fn parse(name: &'static str, s: &str) -> Result<Self, ConfigError> {
        let bytes = hex::decode(s).map_err(|e| ConfigError::InvalidKey {
            name,
            reason: e.to_string(),
        })?;
        let key: [u8; 16] = bytes.try_into().map_err(|b: Vec<u8>| ConfigError::InvalidKey {
            name,
            reason: format!("expected 16 bytes, got {}", b.len()),
        })?;
        Ok(Aes128Key(key))
    }
}

impl fmt::Debug for Aes128Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Keys stay out of logs.
        write!(f, "Aes128Key(..)")
    }
}

/// Device address, canonical byte order (as printed, MSB first).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevAddr(pub [u8; 4]);

impl DevAddr {
    /// Build from the 4 little-endian bytes of an FHDR.
    pub fn from_wire(b: &[u8]) -> Self {
        DevAddr([b[3], b[2], b[1], b[0]])
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }
}

/// 64-bit extended unique identifier (JoinEUI / DevEUI), canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eui64(pub [u8; 8]);

impl Eui64 {
    /// Build from the 8 little-endian bytes on the wire.
    pub fn from_wire(b: &[u8]) -> Self {
        let mut out = [0u8; 8];
        for (i, v) in b[..8].iter().rev().enumerate() {
            out[i] = *v;
        }
        Eui64(out)
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }
}

/// Message type from the MHDR, bits 7..5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MType {
    JoinRequest,
    JoinAccept,
    UnconfirmedUp,
    UnconfirmedDown,
    ConfirmedUp,
    ConfirmedDown,
    RejoinRequest,
    Proprietary,
}

impl MType {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => MType::JoinRequest,
            1 => MType::JoinAccept,
            2 => MType::UnconfirmedUp,
            3 => MType::UnconfirmedDown,
            4 => MType::ConfirmedUp,
            5 => MType::ConfirmedDown,
            6 => MType::RejoinRequest,
            _ => MType::Proprietary,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MType::JoinRequest => "JOIN_REQUEST",
            MType::JoinAccept => "JOIN_ACCEPT",
            MType::UnconfirmedUp => "UNCONFIRMED_UP",
            MType::UnconfirmedDown => "UNCONFIRMED_DOWN",
            MType::ConfirmedUp => "CONFIRMED_UP",
            MType::ConfirmedDown => "CONFIRMED_DOWN",
            MType::RejoinRequest => "REJOIN_REQUEST",
            MType::Proprietary => "PROPRIETARY",
        }
    }
}

/// Protocol major version from the MHDR, bits 1..0. Only R1 is defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Major {
    LorawanR1,
}

impl Major {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits & 0x03 {
            0 => Some(Major::LorawanR1),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        "LORAWAN_R1"
    }
}

/// Negotiated MAC (link-layer) version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MacVersion {
    V1_0,
    V1_0_1,
    V1_0_2,
    V1_0_3,
    V1_0_4,
    V1_1,
}

impl MacVersion {
    /// From 1.1 on, FOpts carried alongside a non-zero FPort are encrypted
    /// with the NwkSEncKey.
    pub fn encrypt_fopts(self) -> bool {
        self >= MacVersion::V1_1
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MacVersion::V1_0 => "1.0",
            MacVersion::V1_0_1 => "1.0.1",
            MacVersion::V1_0_2 => "1.0.2",
            MacVersion::V1_0_3 => "1.0.3",
            MacVersion::V1_0_4 => "1.0.4",
            MacVersion::V1_1 => "1.1",
        }
    }
}

impl FromStr for MacVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1.0" | "1.0.0" => Ok(MacVersion::V1_0),
            "1.0.1" => Ok(MacVersion::V1_0_1),
            "1.0.2" => Ok(MacVersion::V1_0_2),
            "1.0.3" => Ok(MacVersion::V1_0_3),
            "1.0.4" => Ok(MacVersion::V1_0_4),
            "1.1" | "1.1.0" => Ok(MacVersion::V1_1),
            other => Err(ConfigError::InvalidMacVersion(other.to_string())),
        }
    }
}

/// Regional-parameters (PHY) document version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PhyVersion {
    V1_0,
    V1_0_1,
    V1_0_2,
    V1_0_2B,
    V1_0_3A,
    V1_1A,
    V1_1B,
}

impl PhyVersion {
    /// Whether this parameter revision defines the LoRaWAN 1.1 MAC commands
    /// (RekeyInd, ADRParamSetup, RejoinParamSetup).
    pub fn has_1_1_commands(self) -> bool {
        self >= PhyVersion::V1_1A
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PhyVersion::V1_0 => "1.0",
            PhyVersion::V1_0_1 => "1.0.1",
            PhyVersion::V1_0_2 => "1.0.2",
            PhyVersion::V1_0_2B => "1.0.2-b",
            PhyVersion::V1_0_3A => "1.0.3-a",
            PhyVersion::V1_1A => "1.1.0-a",
            PhyVersion::V1_1B => "1.1.0-b",
        }
    }
}

impl FromStr for PhyVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1.0" | "1.0.0" => Ok(PhyVersion::V1_0),
            "1.0.1" => Ok(PhyVersion::V1_0_1),
            "1.0.2" | "1.0.2-a" => Ok(PhyVersion::V1_0_2),
            "1.0.2-b" => Ok(PhyVersion::V1_0_2B),
            "1.0.3" | "1.0.3-a" => Ok(PhyVersion::V1_0_3A),
            "1.1.0-a" | "1.1-a" => Ok(PhyVersion::V1_1A),
            "1.1.0-b" | "1.1-b" => Ok(PhyVersion::V1_1B),
            other => Err(ConfigError::InvalidPhyVersion(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn key_parse_rejects_bad_hex_and_length() {
        assert!(Aes128Key::parse("app_key", "zz").is_err());
        assert!(Aes128Key::parse("app_key", "00112233").is_err());
        let k = Aes128Key::parse("app_key", "000102030405060708090a0b0c0d0e0f").unwrap();
        assert_eq!(k.0, hex!("000102030405060708090a0b0c0d0e0f"));
    }

    #[test]
    fn dev_addr_wire_order_is_reversed() {
        let addr = DevAddr::from_wire(&hex!("04030201"));
        assert_eq!(addr.to_hex(), "01020304");
    }

    #[test]
    fn eui_wire_order_is_reversed() {
        let eui = Eui64::from_wire(&hex!("0807060504030201"));
        assert_eq!(eui.to_hex(), "0102030405060708");
    }

    #[test]
    fn mtype_bit_patterns() {
        assert_eq!(MType::from_bits(0), MType::JoinRequest);
        assert_eq!(MType::from_bits(2), MType::UnconfirmedUp);
        assert_eq!(MType::from_bits(5), MType::ConfirmedDown);
        assert_eq!(MType::from_bits(7), MType::Proprietary);
    }

    #[test]
    fn mac_version_ordering_and_fopts_rule() {
        let v104: MacVersion = "1.0.4".parse().unwrap();
        let v11: MacVersion = "1.1.0".parse().unwrap();
        assert_eq!(v104.as_str(), "1.0.4");
        assert_eq!(v11.as_str(), "1.1");
        assert!(v104 < v11);
        assert!(!v104.encrypt_fopts());
        assert!(v11.encrypt_fopts());
        assert!("2.0".parse::<MacVersion>().is_err());
    }

    #[test]
    fn phy_version_strings() {
        assert_eq!("1.0.3-a".parse::<PhyVersion>().unwrap(), PhyVersion::V1_0_3A);
        assert!(PhyVersion::V1_1A.has_1_1_commands());
        assert!(!PhyVersion::V1_0_3A.has_1_1_commands());
        assert!("1.2".parse::<PhyVersion>().is_err());
    }
}
