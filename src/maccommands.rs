//! Sequential parser for the uplink MAC command stream.
//!
//! One command per iteration: a CID byte, then the fixed number of payload
//! bytes the band table assigns to that CID. Parsing stops at the first
//! unknown identifier or short read and returns whatever decoded cleanly,
//! since a MAC buffer may legitimately be truncated and the decoded prefix
//! is still useful to a human reading the dump.
//!
//! The parser is pure (no logging) so the counter-recovery search can run it
//! hundreds of times as a silent plausibility check; the frame decoder logs
//! the returned error once for the final parse.

use thiserror::Error;

use crate::band::Band;

/// Where and why the stream stopped decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("unknown MAC command identifier 0x{cid:02x} at offset {offset}")]
    UnknownCid { cid: u8, offset: usize },

    #[error("truncated MAC command 0x{cid:02x} at offset {offset}: need {needed} bytes, {remaining} left")]
    Truncated {
        cid: u8,
        offset: usize,
        needed: usize,
        remaining: usize,
    },
}

/// One decoded uplink MAC command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacCommand {
    LinkCheckReq,
    LinkAdrAns {
        channel_mask_ack: bool,
        data_rate_ack: bool,
        tx_power_ack: bool,
    },
    DutyCycleAns,
    RxParamSetupAns {
        channel_ack: bool,
        rx2_data_rate_ack: bool,
        rx1_dr_offset_ack: bool,
    },
    DevStatusAns {
        battery: u8,
        /// Demodulation margin in dB, 6-bit two's complement on the wire.
        margin: i8,
    },
    NewChannelAns {
        channel_frequency_ack: bool,
        data_rate_ack: bool,
    },
    RxTimingSetupAns,
    TxParamSetupAns,
    DlChannelAns {
        channel_frequency_ack: bool,
        uplink_frequency_ack: bool,
    },
    RekeyInd {
        minor: u8,
    },
    AdrParamSetupAns,
    DeviceTimeReq,
    RejoinParamSetupAns {
        time_ack: bool,
    },
}

impl MacCommand {
    pub fn cid(&self) -> u8 {
        match self {
            MacCommand::LinkCheckReq => 0x02,
            MacCommand::LinkAdrAns { .. } => 0x03,
            MacCommand::DutyCycleAns => 0x04,
            MacCommand::RxParamSetupAns { .. } => 0x05,
            MacCommand::DevStatusAns { .. } => 0x06,
            MacCommand::NewChannelAns { .. } => 0x07,
            MacCommand::RxTimingSetupAns => 0x08,
            MacCommand::TxParamSetupAns => 0x09,
            MacCommand::DlChannelAns { .. } => 0x0a,
            MacCommand::RekeyInd { .. } => 0x0b,
            MacCommand::AdrParamSetupAns => 0x0c,
            MacCommand::DeviceTimeReq => 0x0d,
            MacCommand::RejoinParamSetupAns { .. } => 0x0f,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MacCommand::LinkCheckReq => "LINK_CHECK_REQ",
            MacCommand::LinkAdrAns { .. } => "LINK_ADR_ANS",
            MacCommand::DutyCycleAns => "DUTY_CYCLE_ANS",
            MacCommand::RxParamSetupAns { .. } => "RX_PARAM_SETUP_ANS",
            MacCommand::DevStatusAns { .. } => "DEV_STATUS_ANS",
            MacCommand::NewChannelAns { .. } => "NEW_CHANNEL_ANS",
            MacCommand::RxTimingSetupAns => "RX_TIMING_SETUP_ANS",
            MacCommand::TxParamSetupAns => "TX_PARAM_SETUP_ANS",
            MacCommand::DlChannelAns { .. } => "DL_CHANNEL_ANS",
            MacCommand::RekeyInd { .. } => "REKEY_IND",
            MacCommand::AdrParamSetupAns => "ADR_PARAM_SETUP_ANS",
            MacCommand::DeviceTimeReq => "DEVICE_TIME_REQ",
            MacCommand::RejoinParamSetupAns { .. } => "REJOIN_PARAM_SETUP_ANS",
        }
    }
}

/// Sign-extend the 6-bit margin field of DevStatusAns.
fn margin_from_bits(b: u8) -> i8 {
    let m = b & 0x3f;
    if m & 0x20 != 0 {
        (m | 0xc0) as i8
    } else {
        m as i8
    }
}

fn materialize(cid: u8, payload: &[u8]) -> MacCommand {
    match cid {
        0x02 => MacCommand::LinkCheckReq,
        0x03 => MacCommand::LinkAdrAns {
            channel_mask_ack: payload[0] & 0x01 != 0,
            data_rate_ack: payload[0] & 0x02 != 0,
            tx_power_ack: payload[0] & 0x04 != 0,
        },
        0x04 => MacCommand::DutyCycleAns,
        0x05 => MacCommand::RxParamSetupAns {
            channel_ack: payload[0] & 0x01 != 0,
            rx2_data_rate_ack: payload[0] & 0x02 != 0,
            rx1_dr_offset_ack: payload[0] & 0x04 != 0,
        },
        0x06 => MacCommand::DevStatusAns {
            battery: payload[0],
            margin: margin_from_bits(payload[1]),
        },
        0x07 => MacCommand::NewChannelAns {
            channel_frequency_ack: payload[0] & 0x01 != 0,
            data_rate_ack: payload[0] & 0x02 != 0,
        },
        0x08 => MacCommand::RxTimingSetupAns,
        0x09 => MacCommand::TxParamSetupAns,
        0x0a => MacCommand::DlChannelAns {
            channel_frequency_ack: payload[0] & 0x01 != 0,
            uplink_frequency_ack: payload[0] & 0x02 != 0,
        },
        0x0b => MacCommand::RekeyInd {
            minor: payload[0] & 0x0f,
        },
        0x0c => MacCommand::AdrParamSetupAns,
        0x0d => MacCommand::DeviceTimeReq,
        0x0f => MacCommand::RejoinParamSetupAns {
            time_ack: payload[0] & 0x01 != 0,
        },
        // The band table only hands out the identifiers above.
        other => unreachable!("CID 0x{other:02x} has no layout"),
    }
}

/// Decode uplink commands from `buf` in order. Returns the commands decoded
/// before the first failure, and the failure itself if there was one.
pub fn parse_uplink_commands(buf: &[u8], band: &Band) -> (Vec<MacCommand>, Option<StreamError>) {
    let mut commands = Vec::new();
    let mut cursor = 0usize;
    while cursor < buf.len() {
        let cid = buf[cursor];
        let Some(needed) = band.uplink_cmd_payload_len(cid) else {
            return (commands, Some(StreamError::UnknownCid { cid, offset: cursor }));
        };
        let remaining = buf.len() - cursor - 1;
        if remaining < needed {
            return (
                commands,
                Some(StreamError::Truncated {
                    cid,
                    offset: cursor,
                    needed,
                    remaining,
                }),
            );
        }
        commands.push(materialize(cid, &buf[cursor + 1..cursor + 1 + needed]));
        cursor += 1 + needed;
    }
    (commands, None)
}

/// Whether `buf` is a complete, non-empty uplink command stream. Used by the
/// frame-counter search to decide if a candidate plaintext is plausible.
pub fn is_complete_command_stream(buf: &[u8], band: &Band) -> bool {
    let (commands, err) = parse_uplink_commands(buf, band);
    err.is_none() && !commands.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::band::BandDef;
    use crate::types::PhyVersion;
    use hex_literal::hex;

    fn band() -> Band {
        BandDef::get_by_id("EU_863_870")
            .unwrap()
            .version(PhyVersion::V1_0_3A)
            .unwrap()
    }

    #[test]
    fn decodes_a_mixed_stream_in_order() {
        // DevStatusAns(battery 254, margin 10) + LinkAdrAns + LinkCheckReq
        let buf = hex!("06fe0a030702");
        let (cmds, err) = parse_uplink_commands(&buf, &band());
        assert!(err.is_none());
        assert_eq!(
            cmds,
            vec![
                MacCommand::DevStatusAns { battery: 0xfe, margin: 10 },
                MacCommand::LinkAdrAns {
                    channel_mask_ack: true,
                    data_rate_ack: true,
                    tx_power_ack: true,
                },
                MacCommand::LinkCheckReq,
            ]
        );
    }

    #[test]
    fn negative_margin_is_sign_extended() {
        let buf = hex!("06ff3f"); // margin bits 0b111111 = -1
        let (cmds, _) = parse_uplink_commands(&buf, &band());
        assert_eq!(cmds, vec![MacCommand::DevStatusAns { battery: 0xff, margin: -1 }]);
    }

    #[test]
    fn parsing_is_idempotent() {
        let buf = hex!("0602150301");
        let first = parse_uplink_commands(&buf, &band());
        let second = parse_uplink_commands(&buf, &band());
        assert_eq!(first.0, second.0);
        assert_eq!(first.1, second.1);
    }

    #[test]
    fn truncation_yields_the_decoded_prefix() {
        let full = hex!("0301060215");
        let (all, err) = parse_uplink_commands(&full, &band());
        assert!(err.is_none());
        assert_eq!(all.len(), 2);

        // Drop the trailing byte of the last command.
        let (prefix, err) = parse_uplink_commands(&full[..4], &band());
        assert_eq!(prefix, all[..1]);
        assert_eq!(
            err,
            Some(StreamError::Truncated { cid: 0x06, offset: 2, needed: 2, remaining: 1 })
        );
    }

    #[test]
    fn unknown_cid_stops_the_stream() {
        let buf = hex!("02ff02");
        let (cmds, err) = parse_uplink_commands(&buf, &band());
        assert_eq!(cmds, vec![MacCommand::LinkCheckReq]);
        assert_eq!(err, Some(StreamError::UnknownCid { cid: 0xff, offset: 1 }));
    }

    #[test]
    fn complete_stream_check() {
        assert!(is_complete_command_stream(&hex!("06fe0a02"), &band()));
        assert!(!is_complete_command_stream(&[], &band()));
        assert!(!is_complete_command_stream(&hex!("06fe"), &band()));
        assert!(!is_complete_command_stream(&hex!("ff"), &band()));
    }

    #[test]
    fn empty_buffer_decodes_to_nothing() {
        let (cmds, err) = parse_uplink_commands(&[], &band());
        assert!(cmds.is_empty());
        assert!(err.is_none());
    }
}
