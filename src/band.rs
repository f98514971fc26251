//! Regional band registry and the uplink MAC-command layout table.
//!
//! A `Band` is the combination of a region definition and a PHY version; the
//! pair decides which command identifiers are known and how many payload
//! bytes each one carries.

use crate::error::ConfigError;
use crate::types::PhyVersion;

/// Static definition of one region.
#[derive(Debug)]
pub struct BandDef {
    pub id: &'static str,
    /// Regions where TxParamSetup is in effect (the device answers 0x09).
    tx_param_setup: bool,
    /// Earliest regional-parameters revision that defines this band.
    min_phy: PhyVersion,
}

const BANDS: &[BandDef] = &[
    BandDef { id: "EU_863_870", tx_param_setup: false, min_phy: PhyVersion::V1_0 },
    BandDef { id: "US_902_928", tx_param_setup: false, min_phy: PhyVersion::V1_0 },
    BandDef { id: "AU_915_928", tx_param_setup: true, min_phy: PhyVersion::V1_0 },
    BandDef { id: "AS_923", tx_param_setup: true, min_phy: PhyVersion::V1_0_2 },
    BandDef { id: "CN_470_510", tx_param_setup: false, min_phy: PhyVersion::V1_0 },
    BandDef { id: "IN_865_867", tx_param_setup: false, min_phy: PhyVersion::V1_0_2B },
    BandDef { id: "KR_920_923", tx_param_setup: false, min_phy: PhyVersion::V1_0_2 },
    BandDef { id: "RU_864_870", tx_param_setup: false, min_phy: PhyVersion::V1_0_2 },
];

impl BandDef {
    pub fn get_by_id(id: &str) -> Result<&'static BandDef, ConfigError> {
        BANDS
            .iter()
            .find(|b| b.id == id)
            .ok_or_else(|| ConfigError::UnknownBand(id.to_string()))
    }

    /// Pin this region to a PHY version, yielding a usable band table.
    pub fn version(&'static self, phy: PhyVersion) -> Result<Band, ConfigError> {
        if phy < self.min_phy {
            return Err(ConfigError::UnsupportedPhyVersion {
                band: self.id,
                phy: phy.as_str().to_string(),
            });
        }
        Ok(Band { def: self, phy })
    }
}

/// A region pinned to a PHY version.
#[derive(Debug)]
pub struct Band {
    def: &'static BandDef,
    phy: PhyVersion,
}

impl Band {
    pub fn id(&self) -> &'static str {
        self.def.id
    }

    /// Payload length for an uplink MAC command identifier, or `None` when
    /// the identifier is unknown under this band/version.
    pub fn uplink_cmd_payload_len(&self, cid: u8) -> Option<usize> {
        match cid {
            0x02 => Some(0), // LinkCheckReq
            0x03 => Some(1), // LinkADRAns
            0x04 => Some(0), // DutyCycleAns
            0x05 => Some(1), // RXParamSetupAns
            0x06 => Some(2), // DevStatusAns
            0x07 => Some(1), // NewChannelAns
            0x08 => Some(0), // RXTimingSetupAns
            0x09 if self.def.tx_param_setup => Some(0), // TxParamSetupAns
            0x0a => Some(1), // DLChannelAns
            0x0b if self.phy.has_1_1_commands() => Some(1), // RekeyInd
            0x0c if self.phy.has_1_1_commands() => Some(0), // ADRParamSetupAns
            0x0d => Some(0), // DeviceTimeReq
            0x0f if self.phy.has_1_1_commands() => Some(1), // RejoinParamSetupAns
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(id: &str, phy: PhyVersion) -> Band {
        BandDef::get_by_id(id).unwrap().version(phy).unwrap()
    }

    #[test]
    fn unknown_band_is_a_config_error() {
        assert!(BandDef::get_by_id("MARS_100_200").is_err());
    }

    #[test]
    fn phy_version_below_band_minimum_is_rejected() {
        let def = BandDef::get_by_id("AS_923").unwrap();
        assert!(def.version(PhyVersion::V1_0).is_err());
        assert!(def.version(PhyVersion::V1_0_2).is_ok());
    }

    #[test]
    fn tx_param_setup_is_region_gated() {
        let eu = band("EU_863_870", PhyVersion::V1_0_3A);
        let as923 = band("AS_923", PhyVersion::V1_0_3A);
        assert_eq!(eu.uplink_cmd_payload_len(0x09), None);
        assert_eq!(as923.uplink_cmd_payload_len(0x09), Some(0));
    }

    #[test]
    fn lorawan_1_1_commands_are_phy_gated() {
        let old = band("EU_863_870", PhyVersion::V1_0_3A);
        let new = band("EU_863_870", PhyVersion::V1_1A);
        assert_eq!(old.uplink_cmd_payload_len(0x0b), None);
        assert_eq!(new.uplink_cmd_payload_len(0x0b), Some(1));
        assert_eq!(new.uplink_cmd_payload_len(0x0f), Some(1));
    }

    #[test]
    fn core_commands_present_everywhere() {
        let b = band("US_902_928", PhyVersion::V1_0_3A);
        assert_eq!(b.uplink_cmd_payload_len(0x02), Some(0));
        assert_eq!(b.uplink_cmd_payload_len(0x06), Some(2));
        assert_eq!(b.uplink_cmd_payload_len(0xe0), None);
    }
}
