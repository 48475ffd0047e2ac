// src/models/status.rs
use serde::{Deserialize, Serialize};

/// One entry of the status screen's hover list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSample {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Players {
    pub max: i32,
    pub online: i32,
    #[serde(default)]
    pub sample: Vec<PlayerSample>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    pub name: String,
    pub protocol: i32,
}

/// One styled run of a text-component. All style fields are optional and
/// omitted from JSON when unset, matching what vanilla servers emit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underlined: Option<bool>,
}

impl TextRun {
    pub fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            color: None,
            bold: None,
            italic: None,
            underlined: None,
        }
    }
}

/// A component array may freely mix bare strings and styled runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DescriptionPart {
    Text(String),
    Run(TextRun),
}

/// Minecraft's description field: a plain string, an array of runs, or a
/// single styled object. Backends use all three shapes in the wild.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Description {
    Text(String),
    Parts(Vec<DescriptionPart>),
    Run(TextRun),
}

impl Default for Description {
    fn default() -> Self {
        Description::Text(String::new())
    }
}

/// The SLP status payload, as exchanged on the wire and over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStatus {
    pub version: Version,
    pub players: Players,
    #[serde(default)]
    pub description: Description,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    #[serde(
        rename = "enforcesSecureChat",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub enforces_secure_chat: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_string_description() {
        let json = r#"{
            "version": {"name": "Paper 1.16.5", "protocol": 754},
            "players": {"max": 20, "online": 1, "sample": [{"name": "steve"}]},
            "description": "A Minecraft Server"
        }"#;
        let status: ServerStatus = serde_json::from_str(json).unwrap();
        assert!(matches!(status.description, Description::Text(ref s) if s == "A Minecraft Server"));
        assert_eq!(status.players.sample[0].name, "steve");
        assert!(status.players.sample[0].id.is_none());
    }

    #[test]
    fn decodes_component_array_description() {
        let json = r#"{
            "version": {"name": "1.20.1", "protocol": 763},
            "players": {"max": 100, "online": 0},
            "description": ["", {"text": "hi", "bold": true, "color": "aqua"}]
        }"#;
        let status: ServerStatus = serde_json::from_str(json).unwrap();
        match status.description {
            Description::Parts(ref parts) => {
                assert_eq!(parts.len(), 2);
                assert!(matches!(parts[0], DescriptionPart::Text(ref s) if s.is_empty()));
            }
            _ => panic!("expected component array"),
        }
        assert!(status.players.sample.is_empty());
    }

    #[test]
    fn styled_run_omits_unset_fields() {
        let run = TextRun {
            bold: Some(true),
            ..TextRun::plain("Mortar")
        };
        let json = serde_json::to_string(&run).unwrap();
        assert_eq!(json, r#"{"text":"Mortar","bold":true}"#);
    }
}
