//! Top-level frame decoding: message-type dispatch, frame-counter recovery,
//! MAC-buffer decryption and Join-Accept handling.
//!
//! Only envelope parsing can fail the whole frame. Every other step degrades
//! to partial output: a Join-Accept that will not decrypt stays encrypted,
//! and an exhausted counter search leaves the MAC buffer raw. Partial output
//! beats no output when the caller is inspecting a radio capture.

use tracing::{debug, info, warn};

use crate::band::Band;
use crate::crypto;
use crate::error::{CryptoError, DecodeError};
use crate::maccommands::{self, MacCommand};
use crate::types::{Aes128Key, MType, MacVersion};
use crate::wire::{self, DecryptedJoinAccept, EncryptedJoinAccept, MacPayload, Mhdr, Payload};

/// Immutable per-run configuration, built once from the command line.
#[derive(Debug)]
pub struct Config {
    pub band: Band,
    pub mac_version: MacVersion,
    pub app_key: Option<Aes128Key>,
    pub nwk_s_enc_key: Option<Aes128Key>,
}

/// The decoded frame handed to the renderer.
#[derive(Debug)]
pub struct DecodedFrame {
    pub mhdr: Mhdr,
    pub mic: Option<Vec<u8>>,
    pub payload: DecodedPayload,
}

/// Closed payload union, one case per message family. `None` carries no data
/// and covers proprietary/unrecognized types, which still decode successfully
/// to header + MIC.
#[derive(Debug)]
pub enum DecodedPayload {
    JoinRequest(wire::JoinRequest),
    RejoinRequest(wire::RejoinRequest),
    JoinAccept(JoinAcceptView),
    Mac {
        payload: MacPayload,
        /// `Some` on uplinks (possibly empty); `None` on downlinks, where
        /// command parsing is not implemented.
        mac_commands: Option<Vec<MacCommand>>,
    },
    None,
}

/// Pre- and post-decryption Join-Accept are distinct values; the encrypted
/// original is preserved whenever decryption or the structured parse fails.
#[derive(Debug)]
pub enum JoinAcceptView {
    Encrypted(EncryptedJoinAccept),
    Decrypted(DecryptedJoinAccept),
}

/// Decode one raw frame. Fails only when the envelope itself is malformed.
pub fn decode(raw: &[u8], conf: &Config) -> Result<DecodedFrame, DecodeError> {
    let msg = wire::parse_message(raw)?;
    let mut mic = msg.mic;
    let is_uplink = matches!(msg.mhdr.m_type, MType::UnconfirmedUp | MType::ConfirmedUp);

    let payload = match msg.payload {
        Payload::JoinRequest(jr) => DecodedPayload::JoinRequest(jr),
        Payload::RejoinRequest(rj) => DecodedPayload::RejoinRequest(rj),
        Payload::JoinAccept(enc) => {
            let (view, ja_mic) = decrypt_join_accept_payload(conf.app_key.as_ref(), enc);
            mic = ja_mic;
            DecodedPayload::JoinAccept(view)
        }
        Payload::Mac(pld) if is_uplink => decode_uplink_payload(pld, conf),
        Payload::Mac(pld) => {
            // Downlink: both decryption and command parsing are capability
            // gaps, surfaced as advisories; buffers pass through untouched.
            if !pld.mac_buffer().is_empty() {
                info!("NOTE: downlink MAC command parsing is not implemented yet");
            }
            if pld.f_port.unwrap_or(0) > 0 {
                info!("NOTE: downlink application payload decryption is not implemented yet");
            }
            DecodedPayload::Mac { payload: pld, mac_commands: None }
        }
        Payload::None => {
            warn!(m_type = msg.mhdr.m_type.as_str(), "unmatched message type");
            DecodedPayload::None
        }
    };

    Ok(DecodedFrame { mhdr: msg.mhdr, mic, payload })
}

fn decode_uplink_payload(mut pld: MacPayload, conf: &Config) -> DecodedPayload {
    decrypt_uplink_mac_buffer(&mut pld, conf);
    let (mac_commands, err) = maccommands::parse_uplink_commands(pld.mac_buffer(), &conf.band);
    if let Some(e) = err {
        warn!(error = %e, "failed to read MAC command");
    }
    if pld.f_port.unwrap_or(0) > 0 {
        info!("NOTE: uplink application payload decryption is not implemented yet");
    }
    DecodedPayload::Mac { payload: pld, mac_commands: Some(mac_commands) }
}

/// Decrypt the MAC-command buffer of an uplink in place, recovering the full
/// frame counter. Skipped when no key is available or when a pre-1.1 frame
/// carries plaintext FOpts.
fn decrypt_uplink_mac_buffer(pld: &mut MacPayload, conf: &Config) {
    let mac_buf = pld.mac_buffer();
    if mac_buf.is_empty() {
        return;
    }
    if !(pld.f_opts.is_empty() || conf.mac_version.encrypt_fopts()) {
        // FOpts travel unencrypted before 1.1.
        return;
    }
    let Some(key) = conf.nwk_s_enc_key.as_ref() else {
        debug!("no NwkSEncKey supplied, leaving MAC buffer encrypted");
        return;
    };

    let is_fopts = pld.f_port.unwrap_or(0) != 0;
    let addr = pld.dev_addr;
    let buf = mac_buf.to_vec();
    let recovered = recover_frame_counter(pld.f_cnt, |f_cnt| {
        let plaintext = crypto::decrypt_uplink(key, addr, f_cnt, &buf, is_fopts)?;
        // The keystream cipher cannot fail on its own, so a candidate
        // counter is accepted only if its plaintext forms a complete
        // command stream.
        if !maccommands::is_complete_command_stream(&plaintext, &conf.band) {
            return Err(CryptoError::ImplausiblePlaintext);
        }
        Ok(plaintext)
    });

    match recovered {
        Some((f_cnt, plaintext)) => {
            pld.f_cnt = f_cnt;
            if pld.f_port.unwrap_or(0) == 0 {
                pld.frm_payload = plaintext;
            } else {
                pld.f_opts = plaintext;
            }
        }
        None => warn!(
            f_cnt = pld.f_cnt,
            "frame counter recovery exhausted, leaving MAC buffer encrypted"
        ),
    }
}

/// Search the most-significant byte of the frame counter: 255 candidates,
/// first acceptable decryption wins. Pure apart from per-attempt diagnostics;
/// nothing outside the loop is touched until a match is found.
pub fn recover_frame_counter<F>(truncated: u32, mut decrypt: F) -> Option<(u32, Vec<u8>)>
where
    F: FnMut(u32) -> Result<Vec<u8>, CryptoError>,
{
    for msb in 0u32..0xff {
        let f_cnt = msb << 8 | truncated;
        match decrypt(f_cnt) {
            Ok(plaintext) => return Some((f_cnt, plaintext)),
            Err(e) => debug!(f_cnt, error = %e, "failed to decrypt MAC buffer with candidate counter"),
        }
    }
    None
}

/// Decrypt a Join-Accept body and split off its trailing MIC. Returns the
/// payload view plus the MIC to surface at the frame level: null when the
/// block never decrypted, present once the split succeeded even if the
/// structured parse then failed.
fn decrypt_join_accept_payload(
    app_key: Option<&Aes128Key>,
    enc: EncryptedJoinAccept,
) -> (JoinAcceptView, Option<Vec<u8>>) {
    let Some(key) = app_key else {
        warn!("no AppKey supplied, leaving JoinAccept encrypted");
        return (JoinAcceptView::Encrypted(enc), None);
    };
    let buf = match crypto::decrypt_join_accept(key, &enc.0) {
        Ok(buf) => buf,
        Err(e) => {
            warn!(error = %e, "failed to decrypt JoinAccept");
            return (JoinAcceptView::Encrypted(enc), None);
        }
    };
    // The trailing 4 bytes are always the MIC.
    if buf.len() < 4 {
        warn!(len = buf.len(), "invalid JoinAccept length, expected at least 4 bytes");
        return (JoinAcceptView::Encrypted(enc), None);
    }
    let (fields, mic) = buf.split_at(buf.len() - 4);
    match wire::parse_join_accept_fields(fields) {
        Ok(decrypted) => (JoinAcceptView::Decrypted(decrypted), Some(mic.to_vec())),
        Err(e) => {
            warn!(error = %e, "failed to decode JoinAccept");
            (JoinAcceptView::Encrypted(enc), Some(mic.to_vec()))
        }
    }
}
