//! Submission model: what the caller wants done.

use std::str::FromStr;

use serde::de::IntoDeserializer;
use serde::de::value::{Error as ValueError, StrDeserializer};
use serde::{Deserialize, Serialize};

/// Processing mode.
///
/// Legacy option names from older front ends are accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Download, separate into stems, analyze, package.
    #[serde(alias = "link2stems")]
    FullSplit,

    /// Download the audio only.
    #[serde(alias = "getaudio")]
    AudioOnly,

    /// Key/tempo details for audio already present (or downloaded).
    #[serde(alias = "getdetails")]
    DetailsOnly,

    /// Separate and organize stems into a drum kit layout.
    #[serde(alias = "drumkit")]
    DrumKit,
}

impl FromStr for Mode {
    type Err = ValueError;

    /// Canonical and legacy names alike.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let de: StrDeserializer<'_, ValueError> = name.into_deserializer();
        Mode::deserialize(de)
    }
}

fn default_true() -> bool {
    true
}

/// Step toggles. Every toggle defaults to on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Steps {
    #[serde(default = "default_true")]
    pub download: bool,

    #[serde(default = "default_true")]
    pub split: bool,

    #[serde(default = "default_true")]
    pub analyze: bool,

    #[serde(default = "default_true", alias = "zip")]
    pub package: bool,
}

impl Default for Steps {
    fn default() -> Self {
        Self {
            download: true,
            split: true,
            analyze: true,
            package: true,
        }
    }
}

impl Steps {
    pub fn none() -> Self {
        Self {
            download: false,
            split: false,
            analyze: false,
            package: false,
        }
    }
}

/// Immutable job submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawStageRequest")]
pub struct StageRequest {
    /// Remote locator of the audio (URL understood by the acquirer).
    pub source: Option<String>,

    pub mode: Mode,

    pub steps: Steps,
}

/// Wire shape of a submission.
///
/// Older front ends send the mode as `option` and may add a free-form
/// `mode` next to it (`"drumkit"` or `null`). `option` wins when present.
#[derive(Deserialize)]
struct RawStageRequest {
    #[serde(default, alias = "link")]
    source: Option<String>,

    #[serde(default)]
    option: Option<Mode>,

    #[serde(default)]
    mode: Option<String>,

    #[serde(default)]
    steps: Steps,
}

impl TryFrom<RawStageRequest> for StageRequest {
    type Error = String;

    fn try_from(raw: RawStageRequest) -> Result<Self, Self::Error> {
        let mode = match (raw.option, raw.mode) {
            (Some(mode), _) => mode,
            (None, Some(name)) => name.parse::<Mode>().map_err(|e| e.to_string())?,
            (None, None) => return Err("missing field `mode`".to_string()),
        };
        Ok(Self {
            source: raw.source,
            mode,
            steps: raw.steps,
        })
    }
}

impl StageRequest {
    pub fn new(source: Option<String>, mode: Mode, steps: Steps) -> Self {
        Self {
            source,
            mode,
            steps,
        }
    }
}
