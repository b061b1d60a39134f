//! EPG channel records pushed through the bridge by the login page.
//!
//! The vendor flow hands channels over as quoted `key="value",...` strings
//! keyed by the carrier's field names. A fixed set of keys is numeric;
//! everything else stays a string. Unknown keys are ignored.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Keys the vendor format defines as integers.
const NUMERIC_KEYS: [&str; 12] = [
    "UserChannelID",
    "TimeShift",
    "PositionX",
    "PositionY",
    "BeginTime",
    "Interval",
    "Lasting",
    "ChannelType",
    "TimeShiftLength",
    "FCCEnable",
    "FCCFunction",
    "ChannelFCCPort",
];

/// One channel entry, serialized with the carrier's field names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    #[serde(rename = "ChannelID")]
    pub id: String,

    #[serde(rename = "ChannelName")]
    pub name: String,

    #[serde(rename = "UserChannelID")]
    pub user_id: i64,

    #[serde(rename = "ChannelURL")]
    pub url: String,

    #[serde(rename = "TimeShift")]
    pub timeshift: i64,

    #[serde(rename = "ChannelSDP")]
    pub sdp: String,

    #[serde(rename = "TimeShiftURL", default, skip_serializing_if = "Option::is_none")]
    pub timeshift_url: Option<String>,

    #[serde(rename = "ChannelLogURL", default, skip_serializing_if = "Option::is_none")]
    pub log_url: Option<String>,

    #[serde(rename = "ChannelLogoURL", default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,

    #[serde(rename = "PositionX")]
    pub position_x: i64,

    #[serde(rename = "PositionY")]
    pub position_y: i64,

    #[serde(rename = "BeginTime")]
    pub begin_time: i64,

    #[serde(rename = "Interval")]
    pub interval: i64,

    #[serde(rename = "Lasting")]
    pub lasting: i64,

    #[serde(rename = "ChannelType")]
    pub channel_type: i64,

    #[serde(rename = "ChannelPurchased", default, skip_serializing_if = "Option::is_none")]
    pub purchased: Option<Value>,

    #[serde(rename = "TimeShiftLength", default, skip_serializing_if = "Option::is_none")]
    pub timeshift_length: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telecomcode: Option<String>,

    #[serde(rename = "FCCEnable", default, skip_serializing_if = "Option::is_none")]
    pub fcc_enable: Option<i64>,

    #[serde(rename = "FCCFunction", default, skip_serializing_if = "Option::is_none")]
    pub fcc_function: Option<i64>,

    #[serde(rename = "ChannelFCCIP", default, skip_serializing_if = "Option::is_none")]
    pub fcc_ip: Option<String>,

    #[serde(rename = "ChannelFCCPort", default, skip_serializing_if = "Option::is_none")]
    pub fcc_port: Option<i64>,
}

/// Parse a vendor channel string into a [`Channel`].
pub fn parse_channel(content: &str) -> Result<Channel> {
    let mut fields = Map::new();
    // Values arrive quoted; the format never nests quotes.
    let unquoted = content.replace('"', "");
    for item in unquoted.split(',') {
        let Some((key, value)) = item.trim().split_once('=') else {
            return Err(Error::Channel(format!(
                "expected key=value, got '{}'",
                item.trim()
            )));
        };
        let value = if NUMERIC_KEYS.contains(&key) {
            let number: i64 = value.parse().map_err(|_| {
                Error::Channel(format!("field '{key}' must be an integer, got '{value}'"))
            })?;
            Value::from(number)
        } else {
            Value::String(value.to_string())
        };
        fields.insert(key.to_string(), value);
    }
    serde_json::from_value(Value::Object(fields))
        .map_err(|e| Error::Channel(format!("incomplete channel record: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"ChannelID="1001",ChannelName="News HD",UserChannelID=7,ChannelURL="igmp://239.0.0.1:8000",TimeShift=1,ChannelSDP="sdp://239.0.0.1",PositionX=0,PositionY=0,BeginTime=0,Interval=0,Lasting=0,ChannelType=1"#;

    #[test]
    fn parses_vendor_string() {
        let channel = parse_channel(SAMPLE).unwrap();
        assert_eq!(channel.id, "1001");
        assert_eq!(channel.name, "News HD");
        assert_eq!(channel.user_id, 7);
        assert_eq!(channel.url, "igmp://239.0.0.1:8000");
        assert_eq!(channel.channel_type, 1);
        assert!(channel.timeshift_url.is_none());
    }

    #[test]
    fn numeric_keys_are_typed() {
        let channel = parse_channel(SAMPLE).unwrap();
        let value = serde_json::to_value(&channel).unwrap();
        assert!(value["UserChannelID"].is_i64());
        assert!(value["ChannelID"].is_string());
    }

    #[test]
    fn optional_fcc_fields_round_trip() {
        let with_fcc = format!(
            "{SAMPLE},FCCEnable=1,FCCFunction=2,ChannelFCCIP=\"10.0.0.9\",ChannelFCCPort=5500"
        );
        let channel = parse_channel(&with_fcc).unwrap();
        assert_eq!(channel.fcc_enable, Some(1));
        assert_eq!(channel.fcc_ip.as_deref(), Some("10.0.0.9"));
        assert_eq!(channel.fcc_port, Some(5500));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let extra = format!("{SAMPLE},FutureField=\"whatever\"");
        assert!(parse_channel(&extra).is_ok());
    }

    #[test]
    fn bad_number_is_rejected() {
        let broken = SAMPLE.replace("UserChannelID=7", "UserChannelID=seven");
        assert!(matches!(parse_channel(&broken), Err(Error::Channel(_))));
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let broken = SAMPLE.replace("ChannelName=\"News HD\",", "");
        assert!(matches!(parse_channel(&broken), Err(Error::Channel(_))));
    }

    #[test]
    fn malformed_pair_is_rejected() {
        assert!(matches!(
            parse_channel("ChannelID=\"1\",garbage"),
            Err(Error::Channel(_))
        ));
    }
}
