use core_types::{
    AvrcpKind, CallProfile, CallStatus, LinkId, ProtocolEvent, PullCommand, StreamStatus,
};

use crate::fields::Fields;
use crate::ClassifyError;

/// Response keys, checked in this order by [`ResponseClassifier::classify`].
pub mod keys {
    pub const OK: &str = "OK";
    pub const PREFERENCE_SEPARATOR: char = '=';
    pub const ERROR: &str = "ERROR";
    pub const PENDING: &str = "PENDING";
    pub const AVRCP: &str = "AVRCP";
    pub const AVRCP_MEDIA: &str = "AVRCP_MEDIA";
    pub const ABS_VOL: &str = "ABS_VOL";
    /// Call status keys all share this prefix; `CALLER_NUMBER` does not.
    pub const CALL: &str = "CALL_";
    pub const CALLER_NUMBER: &str = "CALLER_NUMBER";
    pub const A2DP_STREAM: &str = "A2DP_STREAM";
    pub const PB_PULL: &str = "PB_PULL";
    pub const PB_PULL_END: &str = "PB_PULL_END";
    pub const NAME: &str = "NAME";
    pub const LINK_LOSS: &str = "LINK_LOSS";
    pub const STATE: &str = "STATE";
    pub const LINK: &str = "LINK";
    pub const LIST: &str = "LIST";

    pub const PROFILE_HFPAG: &str = "HFPAG";
    pub const FLAG_ON: &str = "ON";
}

/// Classifier for Melody Audio response lines.
///
/// Stateless per line except for phonebook capture: after a
/// `PB_PULL_START` every line is payload for that link until one
/// containing `PB_PULL_END`.
#[derive(Debug, Default)]
pub struct ResponseClassifier {
    capture: Option<LinkId>,
}

impl ResponseClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Link whose phonebook payload is being captured, if any.
    pub fn capture_link(&self) -> Option<LinkId> {
        self.capture
    }

    pub fn classify(&mut self, line: &str) -> Result<ProtocolEvent, ClassifyError> {
        if let Some(link_id) = self.capture {
            return Ok(self.capture_payload(link_id, line));
        }

        if line == keys::OK {
            return Ok(ProtocolEvent::Ok);
        }
        if let Some((key, value)) = line.split_once(keys::PREFERENCE_SEPARATOR) {
            return Ok(ProtocolEvent::Preference {
                key: key.trim().to_string(),
                value: value.trim().to_string(),
            });
        }
        if let Some(suffix) = line.strip_prefix(keys::ERROR) {
            return parse_error(line, suffix);
        }
        if line.starts_with(keys::PENDING) {
            return Ok(ProtocolEvent::Pending);
        }
        if line.starts_with(keys::AVRCP) {
            return parse_avrcp(line);
        }
        if line.starts_with(keys::ABS_VOL) {
            return parse_abs_vol(line);
        }
        if line.starts_with(keys::CALL) {
            return parse_call_status(line);
        }
        if line.starts_with(keys::CALLER_NUMBER) {
            return parse_caller_number(line);
        }
        if line.starts_with(keys::A2DP_STREAM) {
            return parse_stream(line);
        }
        if line.starts_with(keys::PB_PULL) {
            return self.parse_pull(line);
        }
        if line.starts_with(keys::NAME) {
            return parse_name(line);
        }
        if line.starts_with(keys::LINK_LOSS) {
            let f = Fields::new("LINK_LOSS", line);
            return Ok(ProtocolEvent::LinkLoss {
                link_id: f.link_id(1)?,
            });
        }
        if line.starts_with(keys::STATE) {
            return parse_state(line);
        }
        if line.starts_with(keys::LINK) {
            return parse_link(line);
        }
        if line.starts_with(keys::LIST) {
            let f = Fields::new("LIST", line);
            return Ok(ProtocolEvent::List {
                address: f.require(1, "address")?.to_string(),
                profiles: f.rest(2),
            });
        }

        Err(ClassifyError::Unclassified(line.to_string()))
    }

    pub fn reset(&mut self) {
        self.capture = None;
    }

    fn capture_payload(&mut self, link_id: LinkId, line: &str) -> ProtocolEvent {
        let data = if line.contains(keys::PB_PULL_END) {
            self.capture = None;
            line.replace(keys::PB_PULL_END, "")
        } else {
            line.to_string()
        };
        ProtocolEvent::PhonebookData { link_id, data }
    }

    fn parse_pull(&mut self, line: &str) -> Result<ProtocolEvent, ClassifyError> {
        let f = Fields::new("PB_PULL", line);
        // Both `PB_PULL <cmd> <link>` and `<cmd> <link>` are seen on the wire.
        let offset = usize::from(f.get(0) == Some(keys::PB_PULL));
        let command = PullCommand::from_key(f.require(offset, "command")?);
        let link_id = f.link_id(offset + 1)?;

        self.capture = match command {
            PullCommand::Start => Some(link_id),
            _ => None,
        };
        Ok(ProtocolEvent::PhonebookPull { link_id, command })
    }
}

fn parse_error(line: &str, suffix: &str) -> Result<ProtocolEvent, ClassifyError> {
    let suffix = suffix.trim();
    if suffix.is_empty() {
        return Ok(ProtocolEvent::Error { code: None });
    }
    let digits = suffix
        .strip_prefix("0x")
        .or_else(|| suffix.strip_prefix("0X"))
        .unwrap_or(suffix);
    u16::from_str_radix(digits, 16)
        .map(|code| ProtocolEvent::Error { code: Some(code) })
        .map_err(|_| ClassifyError::Format {
            category: "ERROR",
            line: line.to_string(),
            reason: format!("invalid hex code '{}'", suffix),
        })
}

fn parse_avrcp(line: &str) -> Result<ProtocolEvent, ClassifyError> {
    let f = Fields::new("AVRCP", line);
    let key = f.require(0, "sub-type")?;
    let kind = AvrcpKind::from_key(key);

    if kind == AvrcpKind::Media {
        return Ok(ProtocolEvent::Avrcp {
            link_id: None,
            kind,
            extras: f.rest(1),
        });
    }
    Ok(ProtocolEvent::Avrcp {
        link_id: Some(f.link_id(1)?),
        kind,
        extras: f.rest(2),
    })
}

fn parse_abs_vol(line: &str) -> Result<ProtocolEvent, ClassifyError> {
    let f = Fields::new("ABS_VOL", line);
    let link_id = f.link_id(1)?;
    let raw = f.require(2, "volume")?;
    let volume = raw
        .parse()
        .map_err(|_| f.error(format!("invalid volume '{}'", raw)))?;
    Ok(ProtocolEvent::AbsoluteVolume { link_id, volume })
}

fn parse_call_status(line: &str) -> Result<ProtocolEvent, ClassifyError> {
    let f = Fields::new("CALL", line);
    let status = CallStatus::from_key(f.require(0, "status")?);
    let profile = match f.require(1, "profile")? {
        keys::PROFILE_HFPAG => CallProfile::Hfpag,
        _ => CallProfile::Hfp,
    };
    Ok(ProtocolEvent::CallStatus {
        link_id: f.link_id(2)?,
        profile,
        status,
    })
}

fn parse_caller_number(line: &str) -> Result<ProtocolEvent, ClassifyError> {
    let f = Fields::new("CALLER_NUMBER", line);
    Ok(ProtocolEvent::CallerNumber {
        link_id: f.link_id(1)?,
        number: f.require(2, "number")?.to_string(),
    })
}

fn parse_stream(line: &str) -> Result<ProtocolEvent, ClassifyError> {
    let f = Fields::new("A2DP_STREAM", line);
    let status = StreamStatus::from_key(f.require(0, "status")?);
    Ok(ProtocolEvent::StreamStatus {
        link_id: f.link_id(1)?,
        status,
    })
}

fn parse_name(line: &str) -> Result<ProtocolEvent, ClassifyError> {
    let f = Fields::new("NAME", line);
    let address = f.require(1, "address")?.to_string();
    let (_, quoted) = line
        .split_once('"')
        .ok_or_else(|| f.error("missing quoted name"))?;
    let name = quoted.split('"').next().unwrap_or_default().to_string();
    Ok(ProtocolEvent::Name { address, name })
}

fn parse_state(line: &str) -> Result<ProtocolEvent, ClassifyError> {
    let f = Fields::new("STATE", line);
    let raw = f.bracketed(1, "connected count")?;
    let connected = raw
        .parse()
        .map_err(|_| f.error(format!("invalid connected count '{}'", raw)))?;
    Ok(ProtocolEvent::State {
        connected,
        connectable: f.bracketed(2, "connectable flag")? == keys::FLAG_ON,
        discoverable: f.bracketed(3, "discoverable flag")? == keys::FLAG_ON,
        ble: f.bracketed(4, "ble flag")?.to_string(),
    })
}

fn parse_link(line: &str) -> Result<ProtocolEvent, ClassifyError> {
    let f = Fields::new("LINK", line);
    Ok(ProtocolEvent::LinkStatus {
        link_id: f.link_id(1)?,
        status: f.require(2, "status")?.to_string(),
        profile: f.require(3, "link type")?.to_string(),
        address: f.require(4, "address")?.to_string(),
        extras: f.rest(5),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(line: &str) -> Result<ProtocolEvent, ClassifyError> {
        ResponseClassifier::new().classify(line)
    }

    fn is_format_error(result: Result<ProtocolEvent, ClassifyError>) -> bool {
        matches!(result, Err(ClassifyError::Format { .. }))
    }

    #[test]
    fn test_acknowledgements() {
        assert_eq!(classify("OK"), Ok(ProtocolEvent::Ok));
        assert_eq!(classify("PENDING"), Ok(ProtocolEvent::Pending));
        assert_eq!(classify("ERROR"), Ok(ProtocolEvent::Error { code: None }));
        assert_eq!(
            classify("ERROR 0x19"),
            Ok(ProtocolEvent::Error { code: Some(0x19) })
        );
        assert_eq!(
            classify("ERROR 0B"),
            Ok(ProtocolEvent::Error { code: Some(0x0B) })
        );
    }

    #[test]
    fn test_malformed_error_code_is_format_error() {
        assert!(is_format_error(classify("ERROR 0xZZ")));
    }

    #[test]
    fn test_preference_splits_on_first_equals() {
        assert_eq!(
            classify("NAME=Car=Audio"),
            Ok(ProtocolEvent::Preference {
                key: "NAME".into(),
                value: "Car=Audio".into()
            })
        );
    }

    #[test]
    fn test_preference_trims_key_and_value() {
        assert_eq!(
            classify("NAME = Car Audio"),
            Ok(ProtocolEvent::Preference {
                key: "NAME".into(),
                value: "Car Audio".into()
            })
        );
    }

    #[test]
    fn test_call_status_not_unclassified() {
        assert_eq!(
            classify("CALL_ACTIVE HFPAG 3"),
            Ok(ProtocolEvent::CallStatus {
                link_id: 3,
                profile: CallProfile::Hfpag,
                status: CallStatus::Active,
            })
        );
        assert_eq!(
            classify("CALL_END HFP 1"),
            Ok(ProtocolEvent::CallStatus {
                link_id: 1,
                profile: CallProfile::Hfp,
                status: CallStatus::End,
            })
        );
    }

    #[test]
    fn test_caller_number_reachable() {
        assert_eq!(
            classify("CALLER_NUMBER 13 5551234"),
            Ok(ProtocolEvent::CallerNumber {
                link_id: 13,
                number: "5551234".into()
            })
        );
    }

    #[test]
    fn test_avrcp_media_has_no_link() {
        assert_eq!(
            classify("AVRCP_MEDIA TITLE:Song"),
            Ok(ProtocolEvent::Avrcp {
                link_id: None,
                kind: AvrcpKind::Media,
                extras: vec!["TITLE:Song".into()],
            })
        );
    }

    #[test]
    fn test_avrcp_with_link() {
        assert_eq!(
            classify("AVRCP_PAUSE 4"),
            Ok(ProtocolEvent::Avrcp {
                link_id: Some(4),
                kind: AvrcpKind::Pause,
                extras: vec![],
            })
        );
    }

    #[test]
    fn test_non_numeric_link_is_format_error() {
        assert!(is_format_error(classify("AVRCP_PLAY x")));
        assert!(is_format_error(classify("LINK_LOSS")));
        assert!(is_format_error(classify("ABS_VOL 2 loud")));
    }

    #[test]
    fn test_abs_vol_and_stream() {
        assert_eq!(
            classify("ABS_VOL 11 64"),
            Ok(ProtocolEvent::AbsoluteVolume {
                link_id: 11,
                volume: 64
            })
        );
        assert_eq!(
            classify("A2DP_STREAM_START 12"),
            Ok(ProtocolEvent::StreamStatus {
                link_id: 12,
                status: StreamStatus::Start
            })
        );
    }

    #[test]
    fn test_phonebook_capture() {
        let mut classifier = ResponseClassifier::new();
        assert_eq!(
            classifier.classify("PB_PULL PB_PULL_START 2"),
            Ok(ProtocolEvent::PhonebookPull {
                link_id: 2,
                command: PullCommand::Start
            })
        );
        assert_eq!(classifier.capture_link(), Some(2));

        // Inside a capture even "OK" is payload.
        assert_eq!(
            classifier.classify("rawdata1"),
            Ok(ProtocolEvent::PhonebookData {
                link_id: 2,
                data: "rawdata1".into()
            })
        );
        assert_eq!(
            classifier.classify("rawdata2PB_PULL_END"),
            Ok(ProtocolEvent::PhonebookData {
                link_id: 2,
                data: "rawdata2".into()
            })
        );
        assert_eq!(classifier.capture_link(), None);
        assert_eq!(classifier.classify("OK"), Ok(ProtocolEvent::Ok));
    }

    #[test]
    fn test_capture_swallows_ok() {
        let mut classifier = ResponseClassifier::new();
        classifier.classify("PB_PULL_START 5").ok();
        assert!(matches!(
            classifier.classify("OK"),
            Ok(ProtocolEvent::PhonebookData { link_id: 5, .. })
        ));
    }

    #[test]
    fn test_reset_closes_capture() {
        let mut classifier = ResponseClassifier::new();
        classifier.classify("PB_PULL PB_PULL_START 2").ok();
        classifier.reset();
        assert_eq!(classifier.classify("OK"), Ok(ProtocolEvent::Ok));
    }

    #[test]
    fn test_pull_ok_is_done() {
        assert_eq!(
            classify("PB_PULL PB_PULL_OK 2"),
            Ok(ProtocolEvent::PhonebookPull {
                link_id: 2,
                command: PullCommand::Done
            })
        );
    }

    #[test]
    fn test_name() {
        assert_eq!(
            classify("NAME 20FABB010203 \"My Phone\""),
            Ok(ProtocolEvent::Name {
                address: "20FABB010203".into(),
                name: "My Phone".into()
            })
        );
        assert!(is_format_error(classify("NAME 20FABB010203")));
    }

    #[test]
    fn test_link_loss_before_link() {
        assert_eq!(
            classify("LINK_LOSS 11"),
            Ok(ProtocolEvent::LinkLoss { link_id: 11 })
        );
        assert_eq!(
            classify("LINK 11 CONNECTED A2DP 20FABB010203 SBC"),
            Ok(ProtocolEvent::LinkStatus {
                link_id: 11,
                status: "CONNECTED".into(),
                profile: "A2DP".into(),
                address: "20FABB010203".into(),
                extras: vec!["SBC".into()],
            })
        );
    }

    #[test]
    fn test_state_flags() {
        assert_eq!(
            classify("STATE CONNECTED[1] CONNECTABLE[ON] DISCOVERABLE[OFF] BLE[ADVERTISING]"),
            Ok(ProtocolEvent::State {
                connected: 1,
                connectable: true,
                discoverable: false,
                ble: "ADVERTISING".into(),
            })
        );
        assert!(is_format_error(classify("STATE CONNECTED[x] A[ON] B[ON] C[ON]")));
    }

    #[test]
    fn test_list() {
        assert_eq!(
            classify("LIST 20FABB010203 A2DP AVRCP"),
            Ok(ProtocolEvent::List {
                address: "20FABB010203".into(),
                profiles: vec!["A2DP".into(), "AVRCP".into()],
            })
        );
    }

    #[test]
    fn test_unclassified() {
        assert_eq!(
            classify("Ready"),
            Err(ClassifyError::Unclassified("Ready".into()))
        );
        assert_eq!(classify(""), Err(ClassifyError::Unclassified("".into())));
    }
}
