//! Client user-agent parsing (SPEC_FULL.md §4.7), grounded on the teacher's
//! `routes/units_for_slot.rs`, which parses the `User-Agent` header with
//! `woothee` to enrich a served unit with OS/browser metadata. Here the
//! same crate classifies the serving request into the `DeviceType`/`OsType`
//! enums carried on the impression row instead.

use primitives::{DeviceType, OsType};
use woothee::{parser::Parser, woothee::VALUE_UNKNOWN};

/// Device/OS pair derived from a request's `User-Agent` header, plus the
/// header value and caller IP carried through unchanged for the stored
/// impression row.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub device_type: DeviceType,
    pub os_type: OsType,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

fn device_type(category: &str) -> DeviceType {
    match category {
        "pc" => DeviceType::Desktop,
        "smartphone" => DeviceType::Mobile,
        "mobilephone" => DeviceType::Mobile,
        "appliance" => DeviceType::Tv,
        _ => DeviceType::Unknown,
    }
}

fn os_type(os: &str) -> OsType {
    if os.starts_with("Windows") {
        OsType::Windows
    } else if os.starts_with("Mac OSX") {
        OsType::MacOs
    } else if os.starts_with("iPhone") || os.starts_with("iPad") || os.starts_with("iPod") {
        OsType::Ios
    } else if os.starts_with("Android") {
        OsType::Android
    } else if os.starts_with("Linux") {
        OsType::Linux
    } else {
        OsType::Unknown
    }
}

/// Classifies a raw `User-Agent` header value. An absent or unrecognized
/// header yields `Unknown`/`Unknown` rather than failing the request —
/// device/OS only enrich the stored impression, they never gate serving.
pub fn parse(user_agent: Option<&str>, ip_address: Option<String>) -> ClientInfo {
    let parsed = user_agent.and_then(|ua| Parser::new().parse(ua));

    let (device_type, os_type) = match parsed {
        Some(result) => {
            let device = if result.category != VALUE_UNKNOWN {
                device_type(result.category)
            } else {
                DeviceType::Unknown
            };
            let os = if result.os != VALUE_UNKNOWN {
                os_type(result.os)
            } else {
                OsType::Unknown
            };
            (device, os)
        }
        None => (DeviceType::Unknown, OsType::Unknown),
    };

    ClientInfo {
        device_type,
        os_type,
        user_agent: user_agent.map(ToString::to_string),
        ip_address,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classifies_a_desktop_chrome_user_agent() {
        let info = parse(
            Some("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/98.0.4758.102 Safari/537.36"),
            Some("203.0.113.1".to_string()),
        );

        assert_eq!(DeviceType::Desktop, info.device_type);
        assert_eq!(OsType::Windows, info.os_type);
    }

    #[test]
    fn classifies_an_ios_user_agent() {
        let info = parse(
            Some("Mozilla/5.0 (iPhone; CPU iPhone OS 15_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.0 Mobile/15E148 Safari/604.1"),
            None,
        );

        assert_eq!(DeviceType::Mobile, info.device_type);
        assert_eq!(OsType::Ios, info.os_type);
    }

    #[test]
    fn missing_user_agent_yields_unknown() {
        let info = parse(None, None);

        assert_eq!(DeviceType::Unknown, info.device_type);
        assert_eq!(OsType::Unknown, info.os_type);
    }
}
