//! Sampling stage: action logs → one sampled-frame file per match.
//!
//! Runs without an engine, in parallel over the match list using rayon.

use std::path::Path;

use rayon::prelude::*;
use replay_core::replay::ReplayInfo;
use replay_core::sampler::{sample_frames, ActionLog, ActionResolver, SampledFrames, SamplingConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::layout::{replay_name, DatasetLayout, MatchList};
use crate::output::write_atomic;

/// How sampling one match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    /// Frame file written with this many frames.
    Sampled(usize),
    /// Frame file already existed.
    AlreadySampled,
}

/// Summary of a sampling run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingReport {
    /// Matches in the list.
    pub total: usize,
    /// Frame files written.
    pub sampled: usize,
    /// Frame files that already existed.
    pub already_sampled: usize,
    /// Matches missing an info file or action log.
    pub skipped: usize,
    /// Matches that failed structurally.
    pub failed: usize,
    /// Frames written across all matches.
    pub frames: usize,
}

fn read_prerequisite(path: &Path, what: &'static str) -> Result<String> {
    if !path.is_file() {
        return Err(PipelineError::MissingPrerequisite {
            what,
            path: path.to_path_buf(),
        });
    }
    std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))
}

/// Compute and write the sampled-frame file of one match.
pub fn sample_match(
    layout: &DatasetLayout,
    infos_dir: &Path,
    replay_path: &Path,
    resolver: &impl ActionResolver,
    config: &SamplingConfig,
) -> Result<SampleOutcome> {
    let replay = replay_name(replay_path)?;
    let target = layout.sampled_frames(&replay);
    if target.is_file() {
        return Ok(SampleOutcome::AlreadySampled);
    }

    let info_path = infos_dir.join(&replay);
    let info: ReplayInfo = serde_json::from_str(&read_prerequisite(&info_path, "replay info")?)
        .map_err(|e| PipelineError::json(&info_path, e))?;
    let players = info.player_pair()?;

    let mut per_participant = Vec::with_capacity(players.len());
    for participant in players {
        let log_path = layout.actions(participant, &replay);
        let log = ActionLog::from_json(&read_prerequisite(&log_path, "action log")?)
            .map_err(|e| PipelineError::json(&log_path, e))?;
        per_participant.push(sample_frames(&log, resolver, config));
    }
    let frames = SampledFrames::union_of_participants(&per_participant)?;

    let json = serde_json::to_vec(&frames).map_err(|e| PipelineError::json(&target, e))?;
    write_atomic(&target, &json)?;
    debug!(replay = %replay, frames = frames.len(), "Sampled");
    Ok(SampleOutcome::Sampled(frames.len()))
}

/// Sample every match in the list.
pub fn run_sampling<R>(matches: &MatchList, config: &PipelineConfig, resolver: &R) -> Result<SamplingReport>
where
    R: ActionResolver + Sync,
{
    let layout = DatasetLayout::new(&config.dataset_dir, &matches.matchup);
    layout.prepare_sampling()?;
    let sampling = config.sampling_config();

    info!(
        matchup = %matches.matchup,
        matches = matches.len(),
        step_mul = sampling.step_mul,
        skip = sampling.skip,
        "Starting frame sampling"
    );

    let run = || {
        matches
            .replays
            .par_iter()
            .map(|replay| {
                let result = sample_match(&layout, &config.infos_dir, replay, resolver, &sampling);
                if let Err(e) = &result {
                    if e.is_configuration() {
                        warn!(replay = %replay.display(), error = %e, "Skipping match");
                    } else {
                        error!(replay = %replay.display(), error = %e, "Sampling failed");
                    }
                }
                result
            })
            .collect::<Vec<_>>()
    };
    let results = match rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers)
        .build()
    {
        Ok(pool) => pool.install(run),
        Err(e) => {
            warn!(error = %e, "Failed to build thread pool, using global pool");
            run()
        }
    };

    let mut report = SamplingReport {
        total: matches.len(),
        ..SamplingReport::default()
    };
    for result in results {
        match result {
            Ok(SampleOutcome::Sampled(frames)) => {
                report.sampled += 1;
                report.frames += frames;
            }
            Ok(SampleOutcome::AlreadySampled) => report.already_sampled += 1,
            Err(e) if e.is_configuration() => report.skipped += 1,
            Err(_) => report.failed += 1,
        }
    }

    info!(
        sampled = report.sampled,
        already_sampled = report.already_sampled,
        skipped = report.skipped,
        failed = report.failed,
        frames = report.frames,
        "Sampling complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use replay_core::replay::{ParticipantInfo, Race};
    use replay_core::sampler::AbilityTable;
    use replay_test_utils::fixtures::{self, action_record};
    use std::path::PathBuf;

    const TRAIN_MARINE: u32 = 560;
    const ATTACK: u32 = 23;

    struct Setup {
        dir: tempfile::TempDir,
        layout: DatasetLayout,
        config: PipelineConfig,
    }

    fn setup() -> Setup {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::default()
            .with_dataset_dir(dir.path().join("ds"))
            .with_infos_dir(dir.path().join("infos"))
            .with_workers(2);
        std::fs::create_dir_all(&config.infos_dir).unwrap();
        Setup {
            layout: DatasetLayout::new(&config.dataset_dir, "Terran_vs_Zerg"),
            dir,
            config,
        }
    }

    fn table() -> AbilityTable {
        AbilityTable::new([(TRAIN_MARINE, "Train_Marine_quick"), (ATTACK, "Attack_screen")])
    }

    fn write_info(s: &Setup, replay: &str, players: Vec<ParticipantInfo>) {
        let info = fixtures::replay_info(players);
        std::fs::write(
            s.config.infos_dir.join(replay),
            serde_json::to_string(&info).unwrap(),
        )
        .unwrap();
    }

    fn write_log(s: &Setup, participant: &ParticipantInfo, replay: &str, steps: Vec<Vec<String>>) {
        let path = s.layout.actions(participant, replay);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, serde_json::to_string(&steps).unwrap()).unwrap();
    }

    fn players() -> Vec<ParticipantInfo> {
        vec![
            ParticipantInfo::player(1, Race::Terran),
            ParticipantInfo::player(2, Race::Zerg),
        ]
    }

    fn replay_path(s: &Setup, name: &str) -> PathBuf {
        s.dir.path().join("replays").join(name)
    }

    #[test]
    fn test_union_written_for_match() {
        let s = setup();
        let players = players();
        write_info(&s, "a.SC2Replay", players.clone());
        // Terran trains at step 1 (frame 8), Zerg at step 3 (frame 24).
        write_log(&s, &players[0], "a.SC2Replay", vec![vec![action_record(TRAIN_MARINE)]]);
        write_log(
            &s,
            &players[1],
            "a.SC2Replay",
            vec![vec![], vec![action_record(ATTACK)], vec![action_record(TRAIN_MARINE)]],
        );
        s.layout.prepare_sampling().unwrap();

        let outcome = sample_match(
            &s.layout,
            &s.config.infos_dir,
            &replay_path(&s, "a.SC2Replay"),
            &table(),
            &s.config.sampling_config(),
        )
        .unwrap();

        assert_eq!(outcome, SampleOutcome::Sampled(2));
        let written = std::fs::read_to_string(s.layout.sampled_frames("a.SC2Replay")).unwrap();
        assert_eq!(written, "[8,24]");
    }

    #[test]
    fn test_missing_action_log_skips_match() {
        let s = setup();
        write_info(&s, "a.SC2Replay", players());
        write_log(&s, &players()[0], "a.SC2Replay", vec![]);
        let matches = MatchList::new("Terran_vs_Zerg", vec![replay_path(&s, "a.SC2Replay")]);

        let report = run_sampling(&matches, &s.config, &table()).unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.sampled, 0);
        assert!(!s.layout.sampled_frames("a.SC2Replay").exists());
    }

    const SHIPPED_ABILITIES: &str = include_str!("../../../data/abilities.ron");

    #[test]
    fn test_shipped_table_covers_every_macro_verb() {
        let names: std::collections::HashMap<u32, String> =
            ron::from_str(SHIPPED_ABILITIES).unwrap();
        let table = AbilityTable::from_ron(SHIPPED_ABILITIES).unwrap();
        assert_eq!(table.len(), names.len());

        for verb in replay_core::sampler::MACRO_PREFIXES {
            assert!(
                names.values().any(|n| n.split('_').next() == Some(*verb)),
                "no ability starts with {verb}"
            );
        }
    }

    #[test]
    fn test_shipped_table_samples_cancel_and_halt() {
        let table = AbilityTable::from_ron(SHIPPED_ABILITIES).unwrap();
        let config = SamplingConfig { step_mul: 8, skip: 96 };
        // Cancel_quick, Halt_quick, Cancel_BuildInProgress_quick, Cancel_Last_quick, Stop_quick
        for id in [3659, 3660, 314, 3671, 3665] {
            let record = format!(r#"{{"action_raw":{{"unit_command":{{"ability_id":{id}}}}}}}"#);
            let log = ActionLog::from_steps(vec![vec![record]]);
            assert_eq!(sample_frames(&log, &table, &config), vec![8], "ability {id}");
        }

        let attack = ActionLog::from_steps(vec![vec![action_record(3674)]]);
        assert!(sample_frames(&attack, &table, &config).is_empty());
    }

    #[test]
    fn test_report_counts_each_kind() {
        let s = setup();
        // ok: two players, empty logs
        write_info(&s, "ok.SC2Replay", players());
        for p in &players() {
            write_log(&s, p, "ok.SC2Replay", vec![vec![]; 12]);
        }
        // failed: one player
        write_info(&s, "solo.SC2Replay", vec![ParticipantInfo::player(1, Race::Terran)]);
        // skipped: no info file
        let matches = MatchList::new(
            "Terran_vs_Zerg",
            ["ok", "solo", "missing"]
                .iter()
                .map(|n| replay_path(&s, &format!("{n}.SC2Replay")))
                .collect(),
        );

        let report = run_sampling(&matches, &s.config, &table()).unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.sampled, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 1);
        // 12 steps of 8 loops reach frame 96 exactly once.
        assert_eq!(report.frames, 1);

        let again = run_sampling(&matches, &s.config, &table()).unwrap();
        assert_eq!(again.already_sampled, 1);
        assert_eq!(again.sampled, 0);
    }
}
