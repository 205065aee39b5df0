//! Stage selection: which stages a request runs, and in what order.
//!
//! | Stage    | FullSplit  | AudioOnly  | DetailsOnly             | DrumKit    |
//! |----------|------------|------------|-------------------------|------------|
//! | Acquire  | `download` | `download` | no audio && `download`  | `download` |
//! | Separate | `split`    | never      | never                   | `split`    |
//! | Analyze  | always     | `analyze`  | always                  | always     |
//! | Classify | never      | never      | never                   | always     |
//! | Package  | always     | `package`  | `package`               | always     |

use crate::domain::{Mode, StageRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Acquire,
    Separate,
    Analyze,
    Classify,
    Package,
}

impl StageKind {
    /// Progress at stage start and after success. Always below 100.
    pub fn checkpoints(self) -> (u8, u8) {
        match self {
            StageKind::Acquire => (5, 15),
            StageKind::Separate => (35, 60),
            StageKind::Analyze => (70, 80),
            StageKind::Classify => (88, 88),
            StageKind::Package => (95, 95),
        }
    }

    /// Log line emitted when the stage starts.
    pub fn announcement(self) -> &'static str {
        match self {
            StageKind::Acquire => "Analyzing link",
            StageKind::Separate => "Starting AI Splitter (Demucs)",
            StageKind::Analyze => "Extracting Key & BPM",
            StageKind::Classify => "Organizing as DrumKit (Kick/Snare/Hat/Perc)",
            StageKind::Package => "Packaging.. prepping for departure.",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StageKind::Acquire => "acquire",
            StageKind::Separate => "separate",
            StageKind::Analyze => "analyze",
            StageKind::Classify => "classify",
            StageKind::Package => "package",
        }
    }
}

/// Ordered stage list derived from a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelinePlan {
    stages: Vec<StageKind>,
}

impl PipelinePlan {
    /// `audio_present`: the job's workspace already holds audio.
    pub fn for_request(request: &StageRequest, audio_present: bool) -> Self {
        let steps = request.steps;
        let mode = request.mode;

        let acquire = match mode {
            Mode::DetailsOnly => steps.download && !audio_present,
            Mode::FullSplit | Mode::AudioOnly | Mode::DrumKit => steps.download,
        };
        let separate = matches!(mode, Mode::FullSplit | Mode::DrumKit) && steps.split;
        let analyze = match mode {
            Mode::AudioOnly => steps.analyze,
            Mode::FullSplit | Mode::DetailsOnly | Mode::DrumKit => true,
        };
        let classify = mode == Mode::DrumKit;
        let package = match mode {
            Mode::AudioOnly | Mode::DetailsOnly => steps.package,
            Mode::FullSplit | Mode::DrumKit => true,
        };

        let stages = [
            (StageKind::Acquire, acquire),
            (StageKind::Separate, separate),
            (StageKind::Analyze, analyze),
            (StageKind::Classify, classify),
            (StageKind::Package, package),
        ]
        .into_iter()
        .filter_map(|(kind, on)| on.then_some(kind))
        .collect();

        Self { stages }
    }

    pub fn stages(&self) -> &[StageKind] {
        &self.stages
    }

    pub fn contains(&self, kind: StageKind) -> bool {
        self.stages.contains(&kind)
    }

    /// Every planned stage consumes audio that must already exist.
    pub fn needs_existing_audio(&self) -> bool {
        !self.stages.is_empty() && !self.contains(StageKind::Acquire)
    }
}
