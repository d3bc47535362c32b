//! Frame sampling from recorded action logs.
//!
//! A frame is worth materializing when the player issued a macro action
//! (building, training, researching, morphing, cancelling, halting, stopping)
//! in the step that ends at it, or when it falls on the periodic interval.
//! Both players of a match are replayed on the union of their sampled frames
//! so their outputs stay frame-aligned.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Function-name prefixes that mark a macro action.
pub const MACRO_PREFIXES: &[&str] = &["Build", "Train", "Research", "Morph", "Cancel", "Halt", "Stop"];

/// Frame counter advance per action-log step.
pub const DEFAULT_STEP_MUL: u32 = 8;
/// Periodic sampling interval in frames.
pub const DEFAULT_SKIP: u32 = 96;

/// Sampling constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Frames advanced per step of the action log.
    pub step_mul: u32,
    /// Every frame divisible by this is sampled.
    pub skip: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            step_mul: DEFAULT_STEP_MUL,
            skip: DEFAULT_SKIP,
        }
    }
}

/// One participant's actions, grouped by step.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionLog {
    steps: Vec<Vec<String>>,
}

impl ActionLog {
    /// Wrap already-grouped serialized action records.
    #[must_use]
    pub fn from_steps(steps: Vec<Vec<String>>) -> Self {
        Self { steps }
    }

    /// Parse a log from its JSON file contents.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Steps in order.
    #[must_use]
    pub fn steps(&self) -> &[Vec<String>] {
        &self.steps
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the log has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Maps a serialized action record to its game-function name.
pub trait ActionResolver {
    /// Function name, or `None` if the record is malformed or unknown.
    fn function_name(&self, record: &str) -> Option<&str>;
}

#[derive(Deserialize)]
struct ActionRecord {
    #[serde(default, alias = "actionRaw")]
    action_raw: Option<CommandHolder>,
    #[serde(default, alias = "actionFeatureLayer")]
    action_feature_layer: Option<CommandHolder>,
    #[serde(default, alias = "actionRender")]
    action_render: Option<CommandHolder>,
}

#[derive(Deserialize)]
struct CommandHolder {
    #[serde(default, alias = "unitCommand")]
    unit_command: Option<UnitCommand>,
}

#[derive(Deserialize)]
struct UnitCommand {
    #[serde(alias = "abilityId")]
    ability_id: u32,
}

impl ActionRecord {
    fn ability_id(&self) -> Option<u32> {
        [&self.action_raw, &self.action_feature_layer, &self.action_render]
            .into_iter()
            .flatten()
            .find_map(|holder| holder.unit_command.as_ref())
            .map(|cmd| cmd.ability_id)
    }
}

/// Resolves unit commands through an ability id → function name table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AbilityTable {
    names: HashMap<u32, String>,
}

impl AbilityTable {
    /// Build a table from `(ability_id, function_name)` pairs.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (u32, S)>,
        S: Into<String>,
    {
        Self {
            names: entries.into_iter().map(|(id, n)| (id, n.into())).collect(),
        }
    }

    /// Parse a RON map of ability ids to function names.
    pub fn from_ron(text: &str) -> Result<Self> {
        Ok(ron::from_str(text)?)
    }

    /// Number of known abilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl ActionResolver for AbilityTable {
    fn function_name(&self, record: &str) -> Option<&str> {
        let record: ActionRecord = serde_json::from_str(record).ok()?;
        self.names.get(&record.ability_id()?).map(String::as_str)
    }
}

/// Whether a function name starts with a macro verb.
#[must_use]
pub fn is_macro_function(name: &str) -> bool {
    let verb = name.split('_').next().unwrap_or_default();
    MACRO_PREFIXES.contains(&verb)
}

/// Frames worth capturing for one participant, ascending.
///
/// The frame counter advances by `step_mul` before each step is inspected,
/// so the first step ends at frame `step_mul`.
pub fn sample_frames(
    log: &ActionLog,
    resolver: &impl ActionResolver,
    config: &SamplingConfig,
) -> Vec<u32> {
    let mut frame = 0u32;
    let mut sampled = Vec::new();

    for step in log.steps() {
        frame = frame.saturating_add(config.step_mul);
        let has_macro = step
            .iter()
            .filter_map(|record| resolver.function_name(record))
            .any(is_macro_function);
        let periodic = config.skip != 0 && frame % config.skip == 0;
        if has_macro || periodic {
            sampled.push(frame);
        }
    }

    tracing::trace!(steps = log.len(), sampled = sampled.len(), "Sampled action log");
    sampled
}

/// Strictly increasing frames at which a match is captured.
///
/// Replay always begins at frame 0, which is implicit and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub struct SampledFrames(Vec<u32>);

impl SampledFrames {
    /// Validate an ascending frame list.
    ///
    /// # Errors
    /// Returns [`CoreError::FrameOrder`] if any frame does not exceed its predecessor.
    pub fn new(frames: Vec<u32>) -> Result<Self> {
        if let Some(w) = frames.windows(2).find(|w| w[1] <= w[0]) {
            return Err(CoreError::FrameOrder {
                previous: w[0],
                current: w[1],
            });
        }
        Ok(Self(frames))
    }

    /// Union of both participants' sampled frames.
    ///
    /// # Errors
    /// Returns [`CoreError::ParticipantCount`] unless exactly two lists are given.
    pub fn union_of_participants(per_participant: &[Vec<u32>]) -> Result<Self> {
        if per_participant.len() != 2 {
            return Err(CoreError::ParticipantCount(per_participant.len()));
        }
        let merged: BTreeSet<u32> = per_participant.iter().flatten().copied().collect();
        Ok(Self(merged.into_iter().collect()))
    }

    /// Frames in order.
    #[must_use]
    pub fn frames(&self) -> &[u32] {
        &self.0
    }

    /// Number of captures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing is captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `(frame, delta)` pairs, where `delta` is the number of loops to step
    /// from the previous capture (or frame 0) to reach `frame`.
    pub fn deltas(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let previous = std::iter::once(0).chain(self.0.iter().copied());
        self.0
            .iter()
            .copied()
            .zip(previous)
            .map(|(frame, prev)| (frame, frame - prev))
    }
}

impl TryFrom<Vec<u32>> for SampledFrames {
    type Error = CoreError;

    fn try_from(frames: Vec<u32>) -> Result<Self> {
        Self::new(frames)
    }
}

impl From<SampledFrames> for Vec<u32> {
    fn from(frames: SampledFrames) -> Self {
        frames.0
    }
}
