//! Wire-envelope parsing: MHDR, MIC and the type-specific payload layouts.
//!
//! This is the only place a frame can fail hard; everything downstream of a
//! successfully parsed envelope degrades instead of erroring. Note that join
//! frames carry their MIC as the trailing 4 bytes, while a Join-Accept body
//! (including its MIC) sits entirely inside the encrypted block.

use crate::error::DecodeError;
use crate::types::{DevAddr, Eui64, MType, Major};

/// MAC header: message type and protocol major version.
#[derive(Debug, Clone, Copy)]
pub struct Mhdr {
    pub m_type: MType,
    pub major: Major,
}

/// A parsed envelope, before any decryption.
#[derive(Debug)]
pub struct Message {
    pub mhdr: Mhdr,
    pub mic: Option<Vec<u8>>,
    pub payload: Payload,
}

/// Type-specific payload union. `None` covers proprietary and any
/// unrecognized message types, which still decode to header + MIC.
#[derive(Debug)]
pub enum Payload {
    JoinRequest(JoinRequest),
    RejoinRequest(RejoinRequest),
    JoinAccept(EncryptedJoinAccept),
    Mac(MacPayload),
    None,
}

#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub join_eui: Eui64,
    pub dev_eui: Eui64,
    /// Canonical byte order (MSB first).
    pub dev_nonce: [u8; 2],
}

/// Rejoin-Request. Types 0 and 2 carry a NetID, type 1 a JoinEUI.
#[derive(Debug, Clone)]
pub struct RejoinRequest {
    pub rejoin_type: u8,
    pub net_id: Option<[u8; 3]>,
    pub join_eui: Option<Eui64>,
    pub dev_eui: Eui64,
    pub rejoin_count: u16,
}

/// The still-encrypted Join-Accept body (16 or 32 bytes incl. MIC).
#[derive(Debug, Clone)]
pub struct EncryptedJoinAccept(pub Vec<u8>);

/// Structured join parameters, produced only from decrypted bytes. A
/// distinct value from [`EncryptedJoinAccept`]; the encrypted original is
/// never mutated.
#[derive(Debug, Clone)]
pub struct DecryptedJoinAccept {
    pub join_nonce: [u8; 3],
    pub net_id: [u8; 3],
    pub dev_addr: DevAddr,
    pub dl_settings: DlSettings,
    pub rx_delay: u8,
    pub cf_list: Option<[u8; 16]>,
}

#[derive(Debug, Clone, Copy)]
pub struct DlSettings {
    pub opt_neg: bool,
    pub rx1_dr_offset: u8,
    pub rx2_data_rate: u8,
}

/// Frame control bits. Bit 4 is FPending on downlink and ClassB on uplink;
/// it is surfaced under one name here.
#[derive(Debug, Clone, Copy)]
pub struct FCtrl {
    pub adr: bool,
    pub adr_ack_req: bool,
    pub ack: bool,
    pub f_pending: bool,
}

impl FCtrl {
    fn from_bits(b: u8) -> Self {
        FCtrl {
            adr: b & 0x80 != 0,
            adr_ack_req: b & 0x40 != 0,
            ack: b & 0x20 != 0,
            f_pending: b & 0x10 != 0,
        }
    }
}

/// Data-frame payload: FHDR, optional FPort and the two opaque buffers.
/// The buffers stay as received until the frame decoder decrypts them.
#[derive(Debug, Clone)]
pub struct MacPayload {
    pub dev_addr: DevAddr,
    pub f_ctrl: FCtrl,
    /// Truncated as transmitted; widened in place on counter recovery.
    pub f_cnt: u32,
    pub f_port: Option<u8>,
    pub f_opts: Vec<u8>,
    pub frm_payload: Vec<u8>,
}

impl MacPayload {
    /// The buffer that carries MAC commands: FRMPayload when FPort is zero
    /// and non-empty, FOpts otherwise. Exactly one of the two holds commands.
    pub fn mac_buffer(&self) -> &[u8] {
        if self.f_port.unwrap_or(0) == 0 && !self.frm_payload.is_empty() {
            &self.frm_payload
        } else {
            &self.f_opts
        }
    }
}

fn malformed(msg: impl Into<String>) -> DecodeError {
    DecodeError::MalformedFrame(msg.into())
}

/// Parse a raw frame into its envelope.
pub fn parse_message(raw: &[u8]) -> Result<Message, DecodeError> {
    if raw.is_empty() {
        return Err(malformed("empty frame"));
    }
    let m_type = MType::from_bits(raw[0] >> 5);
    let major = Major::from_bits(raw[0])
        .ok_or_else(|| malformed(format!("invalid major version: {}", raw[0] & 0x03)))?;
    let mhdr = Mhdr { m_type, major };

    match m_type {
        MType::JoinRequest => {
            if raw.len() != 23 {
                return Err(malformed(format!(
                    "JoinRequest must be 23 bytes, got {}",
                    raw.len()
                )));
            }
            Ok(Message {
                mhdr,
                mic: Some(raw[19..23].to_vec()),
                payload: Payload::JoinRequest(JoinRequest {
                    join_eui: Eui64::from_wire(&raw[1..9]),
                    dev_eui: Eui64::from_wire(&raw[9..17]),
                    dev_nonce: [raw[18], raw[17]],
                }),
            })
        }
        MType::RejoinRequest => parse_rejoin_request(mhdr, raw),
        MType::JoinAccept => {
            if raw.len() != 17 && raw.len() != 33 {
                return Err(malformed(format!(
                    "JoinAccept must be 17 or 33 bytes, got {}",
                    raw.len()
                )));
            }
            Ok(Message {
                mhdr,
                mic: None, // inside the encrypted block
                payload: Payload::JoinAccept(EncryptedJoinAccept(raw[1..].to_vec())),
            })
        }
        MType::UnconfirmedUp | MType::ConfirmedUp | MType::UnconfirmedDown | MType::ConfirmedDown => {
            parse_data_frame(mhdr, raw)
        }
        MType::Proprietary => {
            let mic = if raw.len() >= 5 {
                Some(raw[raw.len() - 4..].to_vec())
            } else {
                None
            };
            Ok(Message {
                mhdr,
                mic,
                payload: Payload::None,
            })
        }
    }
}

fn parse_rejoin_request(mhdr: Mhdr, raw: &[u8]) -> Result<Message, DecodeError> {
    if raw.len() < 2 {
        return Err(malformed("RejoinRequest too short"));
    }
    let rejoin_type = raw[1];
    let (payload, mic) = match rejoin_type {
        0 | 2 => {
            if raw.len() != 19 {
                return Err(malformed(format!(
                    "RejoinRequest type {} must be 19 bytes, got {}",
                    rejoin_type,
                    raw.len()
                )));
            }
            let payload = RejoinRequest {
                rejoin_type,
                net_id: Some([raw[4], raw[3], raw[2]]),
                join_eui: None,
                dev_eui: Eui64::from_wire(&raw[5..13]),
                rejoin_count: u16::from_le_bytes([raw[13], raw[14]]),
            };
            (payload, raw[15..19].to_vec())
        }
        1 => {
            if raw.len() != 24 {
                return Err(malformed(format!(
                    "RejoinRequest type 1 must be 24 bytes, got {}",
                    raw.len()
                )));
            }
            let payload = RejoinRequest {
                rejoin_type,
                net_id: None,
                join_eui: Some(Eui64::from_wire(&raw[2..10])),
                dev_eui: Eui64::from_wire(&raw[10..18]),
                rejoin_count: u16::from_le_bytes([raw[18], raw[19]]),
            };
            (payload, raw[20..24].to_vec())
        }
        other => return Err(malformed(format!("invalid rejoin type: {other}"))),
    };
    Ok(Message {
        mhdr,
        mic: Some(mic),
        payload: Payload::RejoinRequest(payload),
    })
}

fn parse_data_frame(mhdr: Mhdr, raw: &[u8]) -> Result<Message, DecodeError> {
    // MHDR(1) + DevAddr(4) + FCtrl(1) + FCnt(2) + MIC(4)
    if raw.len() < 12 {
        return Err(malformed(format!(
            "data frame must be at least 12 bytes, got {}",
            raw.len()
        )));
    }
    let f_ctrl_byte = raw[5];
    let f_opts_len = (f_ctrl_byte & 0x0f) as usize;
    let body_end = raw.len() - 4;
    if 8 + f_opts_len > body_end {
        return Err(malformed("FOpts length exceeds frame body"));
    }
    let f_opts = raw[8..8 + f_opts_len].to_vec();
    let rest = &raw[8 + f_opts_len..body_end];
    let (f_port, frm_payload) = match rest.split_first() {
        Some((port, frm)) => (Some(*port), frm.to_vec()),
        None => (None, Vec::new()),
    };
    Ok(Message {
        mhdr,
        mic: Some(raw[body_end..].to_vec()),
        payload: Payload::Mac(MacPayload {
            dev_addr: DevAddr::from_wire(&raw[1..5]),
            f_ctrl: FCtrl::from_bits(f_ctrl_byte),
            f_cnt: u16::from_le_bytes([raw[6], raw[7]]) as u32,
            f_port,
            f_opts,
            frm_payload,
        }),
    })
}

/// Parse the structured join parameters out of a decrypted Join-Accept body
/// (MIC already stripped).
pub fn parse_join_accept_fields(buf: &[u8]) -> Result<DecryptedJoinAccept, DecodeError> {
    if buf.len() != 12 && buf.len() != 28 {
        return Err(malformed(format!(
            "JoinAccept fields must be 12 or 28 bytes, got {}",
            buf.len()
        )));
    }
    let dl = buf[10];
    let cf_list = if buf.len() == 28 {
        let mut cf = [0u8; 16];
        cf.copy_from_slice(&buf[12..28]);
        Some(cf)
    } else {
        None
    };
    Ok(DecryptedJoinAccept {
        join_nonce: [buf[2], buf[1], buf[0]],
        net_id: [buf[5], buf[4], buf[3]],
        dev_addr: DevAddr::from_wire(&buf[6..10]),
        dl_settings: DlSettings {
            opt_neg: dl & 0x80 != 0,
            rx1_dr_offset: (dl >> 4) & 0x07,
            rx2_data_rate: dl & 0x0f,
        },
        rx_delay: buf[11],
        cf_list,
    })
}
