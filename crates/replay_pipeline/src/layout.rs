//! Dataset directory layout and match lists.
//!
//! ```text
//! <dataset>/Actions/<matchup>/<Race>/<id>@<replay>
//! <dataset>/SampledFrames/<matchup>/<replay>
//! <dataset>/SampledObservations/<matchup>/<Race>/<id>@<replay>
//! <dataset>/GlobalInfos/<matchup>/<Race>/<id>@<replay>
//! ```

use std::path::{Path, PathBuf};

use replay_core::replay::{ParticipantInfo, Race};
use serde::Deserialize;

use crate::error::{PipelineError, Result};

const ACTIONS: &str = "Actions";
const SAMPLED_FRAMES: &str = "SampledFrames";
const OBSERVATIONS: &str = "SampledObservations";
const GLOBAL_INFOS: &str = "GlobalInfos";

/// File name of a replay path, used as its key throughout the dataset.
pub fn replay_name(replay: &Path) -> Result<String> {
    replay
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| PipelineError::InvalidReplayPath(replay.to_path_buf()))
}

/// Paths into a dataset tree for one matchup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    root: PathBuf,
    matchup: String,
}

impl DatasetLayout {
    /// Layout rooted at `root` for `matchup` (e.g. `Terran_vs_Zerg`).
    pub fn new(root: impl Into<PathBuf>, matchup: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            matchup: matchup.into(),
        }
    }

    /// Dataset root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Matchup name.
    pub fn matchup(&self) -> &str {
        &self.matchup
    }

    fn participant_path(&self, kind: &str, participant: &ParticipantInfo, replay: &str) -> PathBuf {
        self.root
            .join(kind)
            .join(&self.matchup)
            .join(participant.race.name())
            .join(participant.output_name(replay))
    }

    /// Recorded action log of one participant.
    pub fn actions(&self, participant: &ParticipantInfo, replay: &str) -> PathBuf {
        self.participant_path(ACTIONS, participant, replay)
    }

    /// Sampled-frame file of one match.
    pub fn sampled_frames(&self, replay: &str) -> PathBuf {
        self.root.join(SAMPLED_FRAMES).join(&self.matchup).join(replay)
    }

    /// Observation stream of one participant.
    pub fn observations(&self, participant: &ParticipantInfo, replay: &str) -> PathBuf {
        self.participant_path(OBSERVATIONS, participant, replay)
    }

    /// Global-info file of one participant.
    pub fn global_info(&self, participant: &ParticipantInfo, replay: &str) -> PathBuf {
        self.participant_path(GLOBAL_INFOS, participant, replay)
    }

    /// Both outputs of one (match, participant).
    pub fn outputs(&self, participant: &ParticipantInfo, replay: &str) -> ParticipantOutputs {
        ParticipantOutputs {
            observations: self.observations(participant, replay),
            global_info: self.global_info(participant, replay),
        }
    }

    /// Races named by the matchup (`Terran_vs_Zerg` → Terran, Zerg).
    pub fn matchup_races(&self) -> Vec<Race> {
        let mut races: Vec<Race> = self
            .matchup
            .split("_vs_")
            .filter_map(Race::from_name)
            .collect();
        races.dedup();
        races
    }

    /// Create the output directories of the extraction stage.
    pub fn prepare_extraction(&self) -> Result<()> {
        for race in self.matchup_races() {
            for kind in [OBSERVATIONS, GLOBAL_INFOS] {
                let dir = self.root.join(kind).join(&self.matchup).join(race.name());
                std::fs::create_dir_all(&dir).map_err(|e| PipelineError::io(&dir, e))?;
            }
        }
        Ok(())
    }

    /// Create the output directory of the sampling stage.
    pub fn prepare_sampling(&self) -> Result<()> {
        let dir = self.root.join(SAMPLED_FRAMES).join(&self.matchup);
        std::fs::create_dir_all(&dir).map_err(|e| PipelineError::io(&dir, e))
    }
}

/// Output files of one (match, participant).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantOutputs {
    /// Observation stream.
    pub observations: PathBuf,
    /// Global-info file.
    pub global_info: PathBuf,
}

impl ParticipantOutputs {
    /// Both files exist.
    pub fn is_complete(&self) -> bool {
        self.observations.is_file() && self.global_info.is_file()
    }
}

#[derive(Deserialize)]
struct MatchEntry(PathBuf, #[allow(dead_code)] serde_json::Value);

/// Sorted replay paths of one matchup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchList {
    /// Matchup name taken from the list's file stem.
    pub matchup: String,
    /// Replay paths, sorted.
    pub replays: Vec<PathBuf>,
}

impl MatchList {
    /// Load a JSON array of `[path, label]` pairs.
    pub fn load(path: &Path) -> Result<Self> {
        let matchup = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .ok_or_else(|| PipelineError::InvalidReplayPath(path.to_path_buf()))?;
        let contents = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let entries: Vec<MatchEntry> =
            serde_json::from_str(&contents).map_err(|e| PipelineError::json(path, e))?;
        Ok(Self::new(matchup, entries.into_iter().map(|e| e.0).collect()))
    }

    /// Build from paths in any order.
    pub fn new(matchup: impl Into<String>, mut replays: Vec<PathBuf>) -> Self {
        replays.sort();
        Self {
            matchup: matchup.into(),
            replays,
        }
    }

    /// Number of matches.
    pub fn len(&self) -> usize {
        self.replays.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.replays.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let layout = DatasetLayout::new("/ds", "Terran_vs_Zerg");
        let p = ParticipantInfo::player(2, Race::Zerg);

        assert_eq!(
            layout.actions(&p, "a.SC2Replay"),
            PathBuf::from("/ds/Actions/Terran_vs_Zerg/Zerg/2@a.SC2Replay")
        );
        assert_eq!(
            layout.sampled_frames("a.SC2Replay"),
            PathBuf::from("/ds/SampledFrames/Terran_vs_Zerg/a.SC2Replay")
        );
        assert_eq!(
            layout.observations(&p, "a.SC2Replay"),
            PathBuf::from("/ds/SampledObservations/Terran_vs_Zerg/Zerg/2@a.SC2Replay")
        );
        assert_eq!(
            layout.global_info(&p, "a.SC2Replay"),
            PathBuf::from("/ds/GlobalInfos/Terran_vs_Zerg/Zerg/2@a.SC2Replay")
        );
    }

    #[test]
    fn test_matchup_races() {
        assert_eq!(
            DatasetLayout::new("/ds", "Terran_vs_Zerg").matchup_races(),
            vec![Race::Terran, Race::Zerg]
        );
        assert_eq!(
            DatasetLayout::new("/ds", "Protoss_vs_Protoss").matchup_races(),
            vec![Race::Protoss]
        );
        assert!(DatasetLayout::new("/ds", "mixed").matchup_races().is_empty());
    }

    #[test]
    fn test_prepare_creates_race_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DatasetLayout::new(dir.path(), "Terran_vs_Zerg");
        layout.prepare_extraction().unwrap();

        assert!(dir.path().join("SampledObservations/Terran_vs_Zerg/Terran").is_dir());
        assert!(dir.path().join("GlobalInfos/Terran_vs_Zerg/Zerg").is_dir());
    }

    #[test]
    fn test_match_list_sorted_with_matchup_from_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Terran_vs_Terran.json");
        std::fs::write(&path, r#"[["/r/b.SC2Replay", 1], ["/r/a.SC2Replay", "x"]]"#).unwrap();

        let list = MatchList::load(&path).unwrap();
        assert_eq!(list.matchup, "Terran_vs_Terran");
        assert_eq!(
            list.replays,
            vec![PathBuf::from("/r/a.SC2Replay"), PathBuf::from("/r/b.SC2Replay")]
        );
    }

    #[test]
    fn test_replay_name() {
        assert_eq!(replay_name(Path::new("/r/a.SC2Replay")).unwrap(), "a.SC2Replay");
        assert!(replay_name(Path::new("/")).is_err());
    }

    #[test]
    fn test_outputs_complete_needs_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let outputs = ParticipantOutputs {
            observations: dir.path().join("obs"),
            global_info: dir.path().join("info"),
        };
        std::fs::write(&outputs.observations, b"").unwrap();
        assert!(!outputs.is_complete());
        std::fs::write(&outputs.global_info, b"{}").unwrap();
        assert!(outputs.is_complete());
    }
}
