//! Device name resolution and opening.
//!
//! Names starting with `@` are placeholders for "the card's best output for
//! this channel count": they expand to the surround, sysdefault, default and
//! front devices of the card in that order. Every other name is opened as is.

use tracing::debug;

use crate::error::{PcmError, PlaybackError};
use crate::host::{PcmDevice, PcmHost};

/// Expands `name` into the device names to try, best first.
pub(crate) fn candidate_names(name: &str, channels: usize) -> Vec<String> {
    let Some(open_name) = name.strip_prefix('@') else {
        return vec![name.to_string()];
    };

    let mut names = Vec::new();
    if channels > 2 {
        if channels <= 4 {
            names.push(format!("surround40{open_name}"));
        }
        if channels <= 6 {
            names.push(format!("surround51{open_name}"));
        }
        if channels <= 8 {
            names.push(format!("surround71{open_name}"));
        }
    }

    // sysdefault/default only address the first device of a card
    let dev_pos = open_name.find(",DEV=");
    let first_device = match dev_pos {
        None => true,
        Some(pos) => open_name[pos + 5..].starts_with('0'),
    };
    if first_device {
        let mut without_dev = open_name.to_string();
        if let Some(pos) = dev_pos {
            without_dev.replace_range(pos..(pos + 6).min(without_dev.len()), "");
        }
        names.push(format!("sysdefault{without_dev}"));
        names.push(format!("default{without_dev}"));
    }

    names.push(format!("front{open_name}"));
    names
}

/// Appends device parameters to a name.
pub(crate) fn with_params(name: &str, params: &str) -> String {
    if params.is_empty() {
        return name.to_string();
    }
    let separator = if name.contains(':') { ',' } else { ':' };
    format!("{name}{separator}{params}")
}

/// Makes `slot` hold an open handle for `name`, reusing the current one when
/// it already has that name.
fn try_device<H: PcmHost>(
    host: &H,
    name: &str,
    slot: &mut Option<H::Device>,
) -> Result<(), PcmError> {
    if slot.as_ref().is_some_and(|d| d.name() == name) {
        return Ok(());
    }
    *slot = None;
    let device = host.open(name)?;
    debug!(device = %name, "Opened candidate");
    *slot = Some(device);
    Ok(())
}

/// Opens the first working candidate for `name`.
///
/// Each candidate is tried with `params` appended, then bare. `current` is
/// reused if it is already open under a matching name.
pub(crate) fn open_device<H: PcmHost>(
    host: &H,
    name: &str,
    channels: usize,
    params: &str,
    current: Option<H::Device>,
) -> Result<H::Device, PlaybackError> {
    let mut slot = current;
    let mut last_error = PcmError::from_code(-crate::host::errno::ENOENT);

    for candidate in candidate_names(name, channels) {
        let attempts = if params.is_empty() {
            vec![candidate]
        } else {
            vec![with_params(&candidate, params), candidate]
        };
        for attempt in attempts {
            match try_device(host, &attempt, &mut slot) {
                Ok(()) => {
                    if let Some(device) = slot.take() {
                        return Ok(device);
                    }
                }
                Err(e) => {
                    debug!(device = %attempt, error = %e, "Open failed");
                    last_error = e;
                }
            }
        }
    }

    Err(PlaybackError::device_open(name, last_error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{EndpointSpec, VirtualHost};

    #[test]
    fn test_literal_name() {
        assert_eq!(candidate_names("hw:0,0", 6), vec!["hw:0,0"]);
    }

    #[test]
    fn test_surround_chain() {
        assert_eq!(
            candidate_names("@:CARD=PCH,DEV=0", 4),
            vec![
                "surround40:CARD=PCH,DEV=0",
                "surround51:CARD=PCH,DEV=0",
                "surround71:CARD=PCH,DEV=0",
                "sysdefault:CARD=PCH",
                "default:CARD=PCH",
                "front:CARD=PCH,DEV=0",
            ]
        );
        assert_eq!(
            candidate_names("@", 6),
            vec!["surround51", "surround71", "sysdefault", "default", "front"]
        );
        assert_eq!(candidate_names("@", 2), vec!["sysdefault", "default", "front"]);
    }

    #[test]
    fn test_secondary_device_skips_defaults() {
        assert_eq!(
            candidate_names("@:CARD=PCH,DEV=1", 8),
            vec!["surround71:CARD=PCH,DEV=1", "front:CARD=PCH,DEV=1"]
        );
    }

    #[test]
    fn test_with_params_separator() {
        assert_eq!(with_params("hdmi", "AES0=0x06"), "hdmi:AES0=0x06");
        assert_eq!(
            with_params("hdmi:CARD=NVidia,DEV=0", "AES0=0x06"),
            "hdmi:CARD=NVidia,DEV=0,AES0=0x06"
        );
        assert_eq!(with_params("default", ""), "default");
    }

    #[test]
    fn test_open_falls_back_to_bare_name() {
        let host = VirtualHost::new();
        host.add_endpoint(EndpointSpec::new("front:CARD=PCH,DEV=0").accepts_aes(false));

        let device = open_device(&host, "@:CARD=PCH,DEV=0", 2, "AES0=0x04", None).unwrap();
        assert_eq!(device.name(), "front:CARD=PCH,DEV=0");

        let attempts = host.probe().open_attempts;
        assert_eq!(attempts.first().unwrap(), "sysdefault:CARD=PCH,AES0=0x04");
        assert_eq!(attempts.last().unwrap(), "front:CARD=PCH,DEV=0");
    }

    #[test]
    fn test_open_reuses_matching_handle() {
        let host = VirtualHost::new();
        host.add_endpoint(EndpointSpec::new("hw:0"));
        let first = open_device(&host, "hw:0", 2, "", None).unwrap();
        let second = open_device(&host, "hw:0", 2, "", Some(first)).unwrap();
        assert_eq!(second.name(), "hw:0");
        assert_eq!(host.probe().opened.len(), 1);
    }

    #[test]
    fn test_open_failure_reports_name() {
        let host = VirtualHost::new();
        let err = open_device(&host, "@", 2, "", None).unwrap_err();
        assert!(matches!(err, PlaybackError::DeviceOpen { ref device, .. } if device == "@"));
    }
}
