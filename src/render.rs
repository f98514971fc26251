//! JSON rendering of decoded frames: one object per line on stdout.
//!
//! Byte fields render as lowercase hex strings. Fields are emitted even when
//! empty or null so the output shape is stable across frames; the exceptions
//! are optional layout-dependent fields (rejoin NetID vs JoinEUI, CFList)
//! and `mac_commands`, which appears only when commands were decoded.

use serde::Serialize;
use serde_json::{json, Value};

use crate::decode::{DecodedFrame, DecodedPayload, JoinAcceptView};
use crate::maccommands::MacCommand;
use crate::wire::{DecryptedJoinAccept, MacPayload, RejoinRequest};

/// Explicit renderer value, constructed once by the caller and passed to the
/// output step. Carries no state today; it is the single place output-format
/// policy lives.
#[derive(Debug, Default)]
pub struct Renderer;

#[derive(Serialize)]
struct OutputFrame<'a> {
    mhdr: OutputMhdr<'a>,
    mic: Option<String>,
    payload: Value,
}

#[derive(Serialize)]
struct OutputMhdr<'a> {
    m_type: &'a str,
    major: &'a str,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer
    }

    /// Render one frame as a single JSON line.
    pub fn render_line(&self, frame: &DecodedFrame) -> String {
        let out = OutputFrame {
            mhdr: OutputMhdr {
                m_type: frame.mhdr.m_type.as_str(),
                major: frame.mhdr.major.as_str(),
            },
            mic: frame.mic.as_deref().map(hex::encode),
            payload: self.payload_value(&frame.payload),
        };
        // Serialization of this shape cannot fail.
        serde_json::to_string(&out).unwrap_or_else(|e| json!({ "error": e.to_string() }).to_string())
    }

    fn payload_value(&self, payload: &DecodedPayload) -> Value {
        match payload {
            DecodedPayload::JoinRequest(jr) => json!({
                "join_eui": jr.join_eui.to_hex(),
                "dev_eui": jr.dev_eui.to_hex(),
                "dev_nonce": hex::encode(jr.dev_nonce),
            }),
            DecodedPayload::RejoinRequest(rj) => rejoin_value(rj),
            DecodedPayload::JoinAccept(JoinAcceptView::Encrypted(enc)) => json!({
                "encrypted": hex::encode(&enc.0),
            }),
            DecodedPayload::JoinAccept(JoinAcceptView::Decrypted(ja)) => join_accept_value(ja),
            DecodedPayload::Mac { payload, mac_commands } => {
                mac_payload_value(payload, mac_commands.as_deref())
            }
            DecodedPayload::None => Value::Null,
        }
    }
}

fn rejoin_value(rj: &RejoinRequest) -> Value {
    let mut v = json!({
        "rejoin_type": rj.rejoin_type,
        "dev_eui": rj.dev_eui.to_hex(),
        "rejoin_count": rj.rejoin_count,
    });
    if let Some(net_id) = rj.net_id {
        v["net_id"] = json!(hex::encode(net_id));
    }
    if let Some(join_eui) = rj.join_eui {
        v["join_eui"] = json!(join_eui.to_hex());
    }
    v
}

fn join_accept_value(ja: &DecryptedJoinAccept) -> Value {
    let mut v = json!({
        "join_nonce": hex::encode(ja.join_nonce),
        "net_id": hex::encode(ja.net_id),
        "dev_addr": ja.dev_addr.to_hex(),
        "dl_settings": {
            "opt_neg": ja.dl_settings.opt_neg,
            "rx1_dr_offset": ja.dl_settings.rx1_dr_offset,
            "rx2_data_rate": ja.dl_settings.rx2_data_rate,
        },
        "rx_delay": ja.rx_delay,
    });
    if let Some(cf_list) = ja.cf_list {
        v["cf_list"] = json!(hex::encode(cf_list));
    }
    v
}

fn mac_payload_value(pld: &MacPayload, mac_commands: Option<&[MacCommand]>) -> Value {
    let mut v = json!({
        "f_hdr": {
            "dev_addr": pld.dev_addr.to_hex(),
            "f_ctrl": {
                "adr": pld.f_ctrl.adr,
                "adr_ack_req": pld.f_ctrl.adr_ack_req,
                "ack": pld.f_ctrl.ack,
                "f_pending": pld.f_ctrl.f_pending,
            },
            "f_cnt": pld.f_cnt,
            "f_opts": hex::encode(&pld.f_opts),
        },
        "f_port": pld.f_port,
        "frm_payload": hex::encode(&pld.frm_payload),
    });
    match mac_commands {
        Some(cmds) if !cmds.is_empty() => {
            v["mac_commands"] = Value::Array(cmds.iter().map(command_value).collect());
        }
        _ => {}
    }
    v
}

fn command_value(cmd: &MacCommand) -> Value {
    let mut v = json!({
        "cid": cmd.cid(),
        "name": cmd.name(),
    });
    match cmd {
        MacCommand::LinkAdrAns { channel_mask_ack, data_rate_ack, tx_power_ack } => {
            v["channel_mask_ack"] = json!(channel_mask_ack);
            v["data_rate_ack"] = json!(data_rate_ack);
            v["tx_power_ack"] = json!(tx_power_ack);
        }
        MacCommand::RxParamSetupAns { channel_ack, rx2_data_rate_ack, rx1_dr_offset_ack } => {
            v["channel_ack"] = json!(channel_ack);
            v["rx2_data_rate_ack"] = json!(rx2_data_rate_ack);
            v["rx1_dr_offset_ack"] = json!(rx1_dr_offset_ack);
        }
        MacCommand::DevStatusAns { battery, margin } => {
            v["battery"] = json!(battery);
            v["margin"] = json!(margin);
        }
        MacCommand::NewChannelAns { channel_frequency_ack, data_rate_ack } => {
            v["channel_frequency_ack"] = json!(channel_frequency_ack);
            v["data_rate_ack"] = json!(data_rate_ack);
        }
        MacCommand::DlChannelAns { channel_frequency_ack, uplink_frequency_ack } => {
            v["channel_frequency_ack"] = json!(channel_frequency_ack);
            v["uplink_frequency_ack"] = json!(uplink_frequency_ack);
        }
        MacCommand::RekeyInd { minor } => {
            v["minor"] = json!(minor);
        }
        MacCommand::RejoinParamSetupAns { time_ack } => {
            v["time_ack"] = json!(time_ack);
        }
        MacCommand::LinkCheckReq
        | MacCommand::DutyCycleAns
        | MacCommand::RxTimingSetupAns
        | MacCommand::TxParamSetupAns
        | MacCommand::AdrParamSetupAns
        | MacCommand::DeviceTimeReq => {}
    }
    v
}
