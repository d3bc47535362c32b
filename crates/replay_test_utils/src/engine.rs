//! Scripted in-memory simulation engine.
//!
//! Replay files are the JSON form of a [`ReplayInfo`] (see
//! [`fixtures::replay_bytes`](crate::fixtures::replay_bytes)). Every call is
//! counted in shared [`EngineStats`] so tests can assert on what a pipeline
//! actually asked the engine to do, and failures can be injected at chosen
//! points.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use replay_core::engine::{EngineLauncher, SimulationEngine, StartReplay};
use replay_core::error::{CoreError, Result};
use replay_core::observation::Observation;
use replay_core::replay::ReplayInfo;

use crate::fixtures;

/// Counters shared by a launcher and every engine it opens.
#[derive(Debug, Default)]
pub struct EngineStats {
    /// Sessions opened.
    pub launches: AtomicU32,
    /// Replays started.
    pub starts: AtomicU32,
    /// Calls to `step`.
    pub step_calls: AtomicU32,
    /// Total game loops advanced.
    pub loops_stepped: AtomicU32,
    /// Observations captured.
    pub observes: AtomicU32,
    /// Player ids replays were started for, in call order.
    pub observed_players: Mutex<Vec<u32>>,
}

impl EngineStats {
    fn load(counter: &AtomicU32) -> u32 {
        counter.load(Ordering::SeqCst)
    }

    /// Sessions opened so far.
    #[must_use]
    pub fn launches(&self) -> u32 {
        Self::load(&self.launches)
    }

    /// Replays started so far.
    #[must_use]
    pub fn starts(&self) -> u32 {
        Self::load(&self.starts)
    }

    /// `step` calls so far.
    #[must_use]
    pub fn step_calls(&self) -> u32 {
        Self::load(&self.step_calls)
    }

    /// Game loops advanced so far.
    #[must_use]
    pub fn loops_stepped(&self) -> u32 {
        Self::load(&self.loops_stepped)
    }

    /// Observations captured so far.
    #[must_use]
    pub fn observes(&self) -> u32 {
        Self::load(&self.observes)
    }

    /// Snapshot of observed player ids.
    #[must_use]
    pub fn observed_players(&self) -> Vec<u32> {
        self.observed_players
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

/// Callback run after every successful capture.
pub type ObserveHook = Arc<dyn Fn(&EngineStats) + Send + Sync>;

/// Failure injection for scripted engines.
#[derive(Clone, Default)]
pub struct EngineScript {
    /// Refuse to open sessions.
    pub fail_launch: bool,
    /// Fail every `start_replay`.
    pub fail_start: bool,
    /// Fail the n-th capture (1-based) of a replay.
    pub fail_observe_at: Option<u32>,
    /// Restrict `fail_observe_at` to replays observed from this player.
    pub fail_observe_player: Option<u32>,
    /// Runs after each capture.
    pub on_observe: Option<ObserveHook>,
}

impl std::fmt::Debug for EngineScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineScript")
            .field("fail_launch", &self.fail_launch)
            .field("fail_start", &self.fail_start)
            .field("fail_observe_at", &self.fail_observe_at)
            .field("fail_observe_player", &self.fail_observe_player)
            .field("on_observe", &self.on_observe.is_some())
            .finish()
    }
}

/// Opens [`ScriptedEngine`] sessions.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLauncher {
    stats: Arc<EngineStats>,
    script: EngineScript,
}

impl ScriptedLauncher {
    /// Launcher that never fails.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Launcher following the given failure script.
    #[must_use]
    pub fn with_script(script: EngineScript) -> Self {
        Self {
            stats: Arc::default(),
            script,
        }
    }

    /// Shared call counters.
    #[must_use]
    pub fn stats(&self) -> Arc<EngineStats> {
        Arc::clone(&self.stats)
    }
}

impl EngineLauncher for ScriptedLauncher {
    type Engine = ScriptedEngine;

    fn launch(&self) -> Result<ScriptedEngine> {
        if self.script.fail_launch {
            return Err(CoreError::Engine("engine binary unavailable".to_string()));
        }
        self.stats.launches.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedEngine {
            stats: Arc::clone(&self.stats),
            script: self.script.clone(),
            running: None,
        })
    }
}

#[derive(Debug)]
struct RunningReplay {
    info: ReplayInfo,
    player_id: u32,
    map_size: u32,
    game_loop: u32,
    captures: u32,
}

/// In-memory engine session.
#[derive(Debug)]
pub struct ScriptedEngine {
    stats: Arc<EngineStats>,
    script: EngineScript,
    running: Option<RunningReplay>,
}

impl ScriptedEngine {
    fn running(&mut self) -> Result<&mut RunningReplay> {
        self.running
            .as_mut()
            .ok_or_else(|| CoreError::Engine("no replay running".to_string()))
    }

    fn should_fail_capture(&self, replay: &RunningReplay) -> bool {
        let player_matches = self
            .script
            .fail_observe_player
            .map_or(true, |p| p == replay.player_id);
        player_matches && self.script.fail_observe_at == Some(replay.captures)
    }
}

impl SimulationEngine for ScriptedEngine {
    fn replay_info(&mut self, replay_data: &[u8]) -> Result<ReplayInfo> {
        serde_json::from_slice(replay_data)
            .map_err(|e| CoreError::Engine(format!("unreadable replay: {e}")))
    }

    fn start_replay(&mut self, request: StartReplay<'_>) -> Result<()> {
        if self.script.fail_start {
            return Err(CoreError::Engine("replay refused to start".to_string()));
        }
        let info = self.replay_info(request.replay_data)?;
        if !info
            .players
            .iter()
            .any(|p| p.player_id == request.observed_player_id)
        {
            return Err(CoreError::Engine(format!(
                "player {} not in replay",
                request.observed_player_id
            )));
        }

        self.stats.starts.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut players) = self.stats.observed_players.lock() {
            players.push(request.observed_player_id);
        }
        self.running = Some(RunningReplay {
            info,
            player_id: request.observed_player_id,
            map_size: request.options.screen_size().x,
            game_loop: 0,
            captures: 0,
        });
        Ok(())
    }

    fn step(&mut self, count: u32) -> Result<()> {
        let stats = Arc::clone(&self.stats);
        let replay = self.running()?;
        replay.game_loop = replay.game_loop.saturating_add(count);
        stats.step_calls.fetch_add(1, Ordering::SeqCst);
        stats.loops_stepped.fetch_add(count, Ordering::SeqCst);
        Ok(())
    }

    fn observe(&mut self) -> Result<Observation> {
        let replay = self.running()?;
        replay.captures += 1;
        let (game_loop, map_size, player_id) = (replay.game_loop, replay.map_size, replay.player_id);

        let fail = self.running.as_ref().is_some_and(|r| self.should_fail_capture(r));
        if fail {
            tracing::debug!(game_loop, player_id, "Injected capture failure");
            return Err(CoreError::Engine(format!(
                "capture failed at game loop {game_loop}"
            )));
        }

        self.stats.observes.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = &self.script.on_observe {
            hook(&self.stats);
        }
        Ok(fixtures::observation(game_loop, map_size, player_id))
    }

    fn game_info(&mut self) -> Result<String> {
        let replay = self.running()?;
        Ok(format!(
            r#"{{"map_name":"{}","player_id":{}}}"#,
            replay.info.map_name, replay.player_id
        ))
    }

    fn data_raw(&mut self) -> Result<String> {
        self.running()?;
        Ok(r#"{"units":[],"abilities":[]}"#.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replay_core::engine::CaptureConfig;
    use replay_core::replay::Race;

    fn start(engine: &mut ScriptedEngine, bytes: &[u8], player: u32) -> Result<()> {
        engine.start_replay(StartReplay {
            replay_data: bytes,
            map_data: None,
            options: &CaptureConfig::spatial(8, 24.0),
            observed_player_id: player,
        })
    }

    #[test]
    fn test_step_requires_running_replay() {
        let mut engine = ScriptedLauncher::new().launch().unwrap();
        assert!(engine.step(8).is_err());
        assert!(engine.observe().is_err());
    }

    #[test]
    fn test_counts_calls() {
        let launcher = ScriptedLauncher::new();
        let stats = launcher.stats();
        let bytes = fixtures::replay_bytes(&fixtures::two_player_info(Race::Zerg, Race::Zerg));
        let mut engine = launcher.launch().unwrap();

        start(&mut engine, &bytes, 2).unwrap();
        engine.step(8).unwrap();
        engine.step(88).unwrap();
        let obs = engine.observe().unwrap();

        assert_eq!(obs.game_loop, 96);
        assert_eq!(obs.player_common.player_id, 2);
        assert_eq!(stats.launches(), 1);
        assert_eq!(stats.step_calls(), 2);
        assert_eq!(stats.loops_stepped(), 96);
        assert_eq!(stats.observes(), 1);
        assert_eq!(stats.observed_players(), vec![2]);
    }

    #[test]
    fn test_injected_capture_failure_is_player_specific() {
        let launcher = ScriptedLauncher::with_script(EngineScript {
            fail_observe_at: Some(1),
            fail_observe_player: Some(2),
            ..EngineScript::default()
        });
        let bytes = fixtures::replay_bytes(&fixtures::two_player_info(Race::Zerg, Race::Zerg));
        let mut engine = launcher.launch().unwrap();

        start(&mut engine, &bytes, 1).unwrap();
        assert!(engine.observe().is_ok());
        start(&mut engine, &bytes, 2).unwrap();
        assert!(engine.observe().is_err());
    }

    #[test]
    fn test_unknown_player_rejected() {
        let bytes = fixtures::replay_bytes(&fixtures::two_player_info(Race::Zerg, Race::Zerg));
        let mut engine = ScriptedLauncher::new().launch().unwrap();
        assert!(start(&mut engine, &bytes, 7).is_err());
    }
}
