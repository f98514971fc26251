//! lorawan-dump: decode captured LoRaWAN frames into inspectable JSON.
//!
//! Reads one frame per stdin line (raw, `--base64` or `--hex`), decodes and,
//! where session keys were supplied, decrypts it, and writes one JSON object
//! per frame to stdout. Diagnostics go to stderr and never mix with the
//! structured output; `--quiet` silences them entirely.
//!
//! Configuration problems are fatal before the first frame is read. A frame
//! that fails to decode is logged and skipped.

mod band;
mod crypto;
mod decode;
mod error;
mod maccommands;
mod render;
mod types;
mod wire;

use std::io::{self, BufRead};

use base64::Engine;
use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use crate::band::BandDef;
use crate::decode::Config;
use crate::error::ConfigError;
use crate::render::Renderer;
use crate::types::{Aes128Key, MacVersion, PhyVersion};

#[derive(Parser, Debug)]
#[command(name = "lorawan-dump", version, about = "Decode LoRaWAN frames from stdin into JSON")]
struct Cli {
    /// Suppress all diagnostic output.
    #[arg(long)]
    quiet: bool,

    /// Encode instead of decode (not implemented).
    #[arg(long)]
    encode: bool,

    /// Band (region) identifier.
    #[arg(long, default_value = "EU_863_870")]
    band: String,

    /// MAC version.
    #[arg(long = "mac", default_value = "1.0.4")]
    mac_version: String,

    /// PHY (regional parameters) version.
    #[arg(long = "phy", default_value = "1.0.3-a")]
    phy_version: String,

    /// AppKey, 32 hex characters.
    #[arg(long)]
    app_key: Option<String>,

    /// AppSKey, 32 hex characters (accepted, unused by decoding).
    #[arg(long)]
    app_s_key: Option<String>,

    /// FNwkSIntKey; below MAC 1.1 it stands in for all network session keys.
    #[arg(long)]
    f_nwk_s_int_key: Option<String>,

    /// NwkSEncKey (MAC 1.1 and above only).
    #[arg(long)]
    nwk_s_enc_key: Option<String>,

    /// SNwkSIntKey (MAC 1.1 and above only).
    #[arg(long)]
    s_nwk_s_int_key: Option<String>,

    /// Frames are base64 encoded, one per line.
    #[arg(long, conflicts_with = "hex")]
    base64: bool,

    /// Frames are hex encoded, one per line.
    #[arg(long)]
    hex: bool,
}

fn build_config(cli: &Cli) -> Result<Config, ConfigError> {
    if cli.encode {
        return Err(ConfigError::EncodeUnimplemented);
    }

    let mac_version: MacVersion = cli.mac_version.parse()?;
    let phy_version: PhyVersion = cli.phy_version.parse()?;
    let band = BandDef::get_by_id(&cli.band)?.version(phy_version)?;

    let app_key = cli
        .app_key
        .as_deref()
        .map(|s| Aes128Key::parse("AppKey", s))
        .transpose()?;

    // AppSKey is accepted and validated but never used: uplink application
    // payloads are deliberately left encrypted in the output.
    cli.app_s_key
        .as_deref()
        .map(|s| Aes128Key::parse("AppSKey", s))
        .transpose()?;

    // The split 1.1 session keys do not exist under older MAC versions.
    // MIC verification is out of scope, so SNwkSIntKey is validated and
    // dropped even when it is allowed.
    if cli.s_nwk_s_int_key.is_some() && mac_version < MacVersion::V1_1 {
        return Err(ConfigError::KeyNotAllowed {
            name: "SNwkSIntKey",
            version: cli.mac_version.clone(),
        });
    }
    cli.s_nwk_s_int_key
        .as_deref()
        .map(|s| Aes128Key::parse("SNwkSIntKey", s))
        .transpose()?;

    if cli.nwk_s_enc_key.is_some() && mac_version < MacVersion::V1_1 {
        return Err(ConfigError::KeyNotAllowed {
            name: "NwkSEncKey",
            version: cli.mac_version.clone(),
        });
    }
    let mut nwk_s_enc_key = cli
        .nwk_s_enc_key
        .as_deref()
        .map(|s| Aes128Key::parse("NwkSEncKey", s))
        .transpose()?;

    let f_nwk_s_int_key = cli
        .f_nwk_s_int_key
        .as_deref()
        .map(|s| Aes128Key::parse("FNwkSIntKey", s))
        .transpose()?;
    if let Some(legacy) = f_nwk_s_int_key {
        // Pre-1.1 there is a single network session key covering both the
        // integrity and encryption roles.
        if mac_version < MacVersion::V1_1 {
            nwk_s_enc_key = Some(legacy);
        }
    }

    Ok(Config {
        band,
        mac_version,
        app_key,
        nwk_s_enc_key,
    })
}

#[derive(Debug, Clone, Copy)]
enum LineEncoding {
    Raw,
    Base64,
    Hex,
}

/// Decode one input line into frame bytes. Raw lines are arbitrary binary
/// and pass through untouched; base64 and hex lines are text and must be
/// valid UTF-8.
fn frame_bytes(encoding: LineEncoding, line: &[u8]) -> Result<Vec<u8>, String> {
    // A trailing CR is line-ending residue, not frame data.
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    match encoding {
        LineEncoding::Raw => Ok(line.to_vec()),
        LineEncoding::Base64 => {
            let text = std::str::from_utf8(line).map_err(|e| format!("base64: {e}"))?;
            base64::engine::general_purpose::STANDARD
                .decode(text.trim())
                .map_err(|e| format!("base64: {e}"))
        }
        LineEncoding::Hex => {
            let text = std::str::from_utf8(line).map_err(|e| format!("hex: {e}"))?;
            hex::decode(text.trim()).map_err(|e| format!("hex: {e}"))
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.quiet {
        EnvFilter::new("off")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let conf = match build_config(&cli) {
        Ok(conf) => conf,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };
    debug!(
        band = conf.band.id(),
        mac_version = conf.mac_version.as_str(),
        "configuration ready"
    );

    let encoding = if cli.base64 {
        LineEncoding::Base64
    } else if cli.hex {
        LineEncoding::Hex
    } else {
        LineEncoding::Raw
    };

    let renderer = Renderer::new();
    // Lines are read as raw bytes: frames in the default raw mode are
    // arbitrary binary, so the loop must not require UTF-8.
    for line in io::stdin().lock().split(b'\n') {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "failed to read stdin");
                break;
            }
        };
        if line.is_empty() || line == b"\r" {
            continue;
        }
        let raw = match frame_bytes(encoding, &line) {
            Ok(raw) => raw,
            Err(e) => {
                error!(error = %e, "failed to decode input line");
                continue;
            }
        };
        match decode::decode(&raw, &conf) {
            Ok(frame) => println!("{}", renderer.render_line(&frame)),
            Err(e) => error!(error = %e, "failed to decode frame"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("lorawan-dump").chain(args.iter().copied()))
    }

    const KEY: &str = "000102030405060708090a0b0c0d0e0f";

    #[test]
    fn default_configuration_builds() {
        let conf = build_config(&cli(&[])).unwrap();
        assert_eq!(conf.band.id(), "EU_863_870");
        assert_eq!(conf.mac_version, MacVersion::V1_0_4);
        assert!(conf.app_key.is_none());
        assert!(conf.nwk_s_enc_key.is_none());
    }

    #[test]
    fn encode_direction_is_fatal() {
        assert!(matches!(
            build_config(&cli(&["--encode"])),
            Err(ConfigError::EncodeUnimplemented)
        ));
    }

    #[test]
    fn split_session_keys_are_rejected_below_1_1() {
        assert!(matches!(
            build_config(&cli(&["--s-nwk-s-int-key", KEY])),
            Err(ConfigError::KeyNotAllowed { name: "SNwkSIntKey", .. })
        ));
        assert!(matches!(
            build_config(&cli(&["--nwk-s-enc-key", KEY])),
            Err(ConfigError::KeyNotAllowed { name: "NwkSEncKey", .. })
        ));
        let conf = build_config(&cli(&["--mac", "1.1.0", "--nwk-s-enc-key", KEY])).unwrap();
        assert!(conf.nwk_s_enc_key.is_some());
    }

    #[test]
    fn legacy_key_covers_encryption_below_1_1() {
        let conf = build_config(&cli(&["--f-nwk-s-int-key", KEY])).unwrap();
        assert_eq!(conf.nwk_s_enc_key, Some(Aes128Key::parse("k", KEY).unwrap()));
        // Under 1.1 the legacy key must not leak into the encryption role.
        let conf = build_config(&cli(&["--mac", "1.1.0", "--f-nwk-s-int-key", KEY])).unwrap();
        assert!(conf.nwk_s_enc_key.is_none());
    }

    #[test]
    fn bad_versions_and_keys_are_fatal() {
        assert!(build_config(&cli(&["--mac", "9.9"])).is_err());
        assert!(build_config(&cli(&["--phy", "1.2.3"])).is_err());
        assert!(build_config(&cli(&["--band", "MOON_000_001"])).is_err());
        assert!(build_config(&cli(&["--app-key", "notahexkey"])).is_err());
        assert!(build_config(&cli(&["--app-s-key", "0011"])).is_err());
    }

    #[test]
    fn base64_and_hex_are_mutually_exclusive() {
        assert!(Cli::try_parse_from(["lorawan-dump", "--base64", "--hex"]).is_err());
    }

    #[test]
    fn line_encodings() {
        assert_eq!(frame_bytes(LineEncoding::Hex, b"00ff").unwrap(), vec![0x00, 0xff]);
        assert_eq!(frame_bytes(LineEncoding::Base64, b"AP8=").unwrap(), vec![0x00, 0xff]);
        assert_eq!(frame_bytes(LineEncoding::Raw, b"AB").unwrap(), b"AB".to_vec());
        assert!(frame_bytes(LineEncoding::Hex, b"xyz").is_err());
        assert!(frame_bytes(LineEncoding::Base64, b"!!").is_err());
    }

    #[test]
    fn raw_mode_accepts_arbitrary_binary_lines() {
        // A frame is arbitrary bytes; raw input must not demand UTF-8.
        let mut frame = vec![0x00];
        frame.extend_from_slice(&[0xff; 16]); // invalid UTF-8 throughout
        frame.extend_from_slice(&[0x80, 0x81]);
        frame.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        let raw = frame_bytes(LineEncoding::Raw, &frame).unwrap();
        assert_eq!(raw, frame);
        // And the result is decodable end to end (a 23-byte JoinRequest).
        let conf = build_config(&cli(&[])).unwrap();
        let decoded = decode::decode(&raw, &conf).unwrap();
        assert_eq!(decoded.mic.as_deref(), Some([0xde, 0xad, 0xbe, 0xef].as_slice()));
    }

    #[test]
    fn trailing_carriage_return_is_stripped() {
        assert_eq!(frame_bytes(LineEncoding::Hex, b"00ff\r").unwrap(), vec![0x00, 0xff]);
        assert_eq!(
            frame_bytes(LineEncoding::Raw, b"\x40\x01\r").unwrap(),
            vec![0x40, 0x01]
        );
        // Non-UTF-8 text-mode lines fail cleanly instead of panicking.
        assert!(frame_bytes(LineEncoding::Hex, &[0xff, 0xfe]).is_err());
    }
}
