//! Engine sessions backed by a child process speaking [`protocol`](crate::protocol).

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};

use replay_core::engine::{EngineLauncher, SimulationEngine, StartReplay};
use replay_core::error::{CoreError, Result};
use replay_core::observation::Observation;
use replay_core::replay::ReplayInfo;
use tracing::{debug, warn};

use crate::config::EngineCommand;
use crate::protocol::{Request, Response};

fn wire_error(context: &str, e: impl std::fmt::Display) -> CoreError {
    CoreError::Engine(format!("{context}: {e}"))
}

/// Request/response exchange over any line-oriented byte stream.
#[derive(Debug)]
pub struct EngineConnection<R, W> {
    reader: R,
    writer: W,
    line: String,
}

impl<R: BufRead, W: Write> EngineConnection<R, W> {
    /// Connection reading responses from `reader` and writing requests to `writer`.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            line: String::new(),
        }
    }

    /// Consume the connection, returning its halves.
    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }

    /// Write one request without waiting for a response.
    pub fn send(&mut self, request: &Request) -> Result<()> {
        let line = request
            .to_json_line()
            .map_err(|e| wire_error("encoding request", e))?;
        self.writer
            .write_all(line.as_bytes())
            .and_then(|()| self.writer.flush())
            .map_err(|e| wire_error("writing to engine", e))
    }

    /// Send a request and read its response. Engine-side errors become
    /// [`CoreError::Engine`].
    pub fn call(&mut self, request: &Request) -> Result<Response> {
        self.send(request)?;
        self.line.clear();
        let read = self
            .reader
            .read_line(&mut self.line)
            .map_err(|e| wire_error("reading from engine", e))?;
        if read == 0 {
            return Err(CoreError::Engine(format!(
                "engine closed the connection during '{}'",
                request.name()
            )));
        }
        match Response::from_json(self.line.trim_end()) {
            Ok(Response::Error { message }) => Err(CoreError::Engine(message)),
            Ok(response) => Ok(response),
            Err(e) => Err(wire_error("malformed response", e)),
        }
    }

    fn unexpected(request: &Request, response: &Response) -> CoreError {
        CoreError::Engine(format!(
            "unexpected '{}' response to '{}'",
            response.name(),
            request.name()
        ))
    }
}

impl<R: BufRead, W: Write> SimulationEngine for EngineConnection<R, W> {
    fn replay_info(&mut self, replay_data: &[u8]) -> Result<ReplayInfo> {
        let request = Request::ReplayInfo {
            replay_data: replay_data.to_vec(),
        };
        match self.call(&request)? {
            Response::ReplayInfo { info } => Ok(info),
            other => Err(Self::unexpected(&request, &other)),
        }
    }

    fn start_replay(&mut self, start: StartReplay<'_>) -> Result<()> {
        let request = Request::StartReplay {
            replay_data: start.replay_data.to_vec(),
            map_data: start.map_data.map(<[u8]>::to_vec),
            options: *start.options,
            observed_player_id: start.observed_player_id,
        };
        match self.call(&request)? {
            Response::Started => Ok(()),
            other => Err(Self::unexpected(&request, &other)),
        }
    }

    fn step(&mut self, count: u32) -> Result<()> {
        let request = Request::Step { count };
        match self.call(&request)? {
            Response::Stepped { .. } => Ok(()),
            other => Err(Self::unexpected(&request, &other)),
        }
    }

    fn observe(&mut self) -> Result<Observation> {
        match self.call(&Request::Observe)? {
            Response::Observation { observation } => Ok(observation),
            other => Err(Self::unexpected(&Request::Observe, &other)),
        }
    }

    fn game_info(&mut self) -> Result<String> {
        match self.call(&Request::GameInfo)? {
            Response::GameInfo { text } => Ok(text),
            other => Err(Self::unexpected(&Request::GameInfo, &other)),
        }
    }

    fn data_raw(&mut self) -> Result<String> {
        match self.call(&Request::DataRaw)? {
            Response::DataRaw { text } => Ok(text),
            other => Err(Self::unexpected(&Request::DataRaw, &other)),
        }
    }
}

/// Engine session running in a child process.
///
/// Dropping the session asks the engine to quit and reaps the process.
#[derive(Debug)]
pub struct ProcessEngine {
    child: Child,
    connection: EngineConnection<BufReader<ChildStdout>, BufWriter<ChildStdin>>,
}

impl SimulationEngine for ProcessEngine {
    fn replay_info(&mut self, replay_data: &[u8]) -> Result<ReplayInfo> {
        self.connection.replay_info(replay_data)
    }

    fn start_replay(&mut self, request: StartReplay<'_>) -> Result<()> {
        self.connection.start_replay(request)
    }

    fn step(&mut self, count: u32) -> Result<()> {
        self.connection.step(count)
    }

    fn observe(&mut self) -> Result<Observation> {
        self.connection.observe()
    }

    fn game_info(&mut self) -> Result<String> {
        self.connection.game_info()
    }

    fn data_raw(&mut self) -> Result<String> {
        self.connection.data_raw()
    }
}

impl Drop for ProcessEngine {
    fn drop(&mut self) {
        if let Err(e) = self.connection.send(&Request::Quit) {
            debug!(error = %e, "Engine did not accept quit");
        }
        reap(&mut self.child);
    }
}

/// Kill `child` if it is still running and collect its exit status.
fn reap(child: &mut Child) -> Option<ExitStatus> {
    let pid = child.id();
    match child.try_wait() {
        Ok(Some(status)) => return Some(status),
        Ok(None) => {
            if let Err(e) = child.kill() {
                warn!(pid, error = %e, "Failed to kill engine process");
            }
        }
        Err(e) => debug!(pid, error = %e, "Failed to poll engine process"),
    }
    match child.wait() {
        Ok(status) => {
            debug!(pid, %status, "Engine process exited");
            Some(status)
        }
        Err(e) => {
            warn!(pid, error = %e, "Failed to reap engine process");
            None
        }
    }
}

/// Spawns one engine process per session.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    command: EngineCommand,
}

impl ProcessLauncher {
    /// Launcher running `command`.
    pub fn new(command: EngineCommand) -> Self {
        Self { command }
    }
}

impl EngineLauncher for ProcessLauncher {
    type Engine = ProcessEngine;

    fn launch(&self) -> Result<ProcessEngine> {
        let mut child = Command::new(&self.command.program)
            .args(&self.command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| wire_error(&format!("spawning '{}'", self.command.program), e))?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            reap(&mut child);
            return Err(CoreError::Engine("engine pipes unavailable".to_string()));
        };
        debug!(program = %self.command.program, pid = child.id(), "Engine process started");

        Ok(ProcessEngine {
            child,
            connection: EngineConnection::new(BufReader::new(stdout), BufWriter::new(stdin)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replay_core::engine::CaptureConfig;
    use replay_core::replay::Race;
    use replay_test_utils::fixtures;
    use std::io::Cursor;

    fn connection(responses: &[Response]) -> EngineConnection<Cursor<Vec<u8>>, Vec<u8>> {
        let script: String = responses.iter().map(Response::to_json_line).collect();
        EngineConnection::new(Cursor::new(script.into_bytes()), Vec::new())
    }

    fn sent(conn: EngineConnection<Cursor<Vec<u8>>, Vec<u8>>) -> Vec<Request> {
        let (_, written) = conn.into_inner();
        String::from_utf8(written)
            .unwrap()
            .lines()
            .map(|l| Request::from_json(l).unwrap())
            .collect()
    }

    #[test]
    fn test_session_exchange() {
        let info = fixtures::two_player_info(Race::Terran, Race::Protoss);
        let observation = fixtures::observation(8, 4, 1);
        let mut conn = connection(&[
            Response::ReplayInfo { info: info.clone() },
            Response::Started,
            Response::Stepped { game_loop: 8 },
            Response::Observation {
                observation: observation.clone(),
            },
        ]);

        assert_eq!(conn.replay_info(b"replay").unwrap(), info);
        conn.start_replay(StartReplay {
            replay_data: b"replay",
            map_data: Some(&b"map"[..]),
            options: &CaptureConfig::spatial(4, 24.0),
            observed_player_id: 1,
        })
        .unwrap();
        conn.step(8).unwrap();
        assert_eq!(conn.observe().unwrap(), observation);

        let requests = sent(conn);
        assert_eq!(requests.len(), 4);
        assert!(matches!(
            &requests[1],
            Request::StartReplay { map_data: Some(m), observed_player_id: 1, .. } if m == b"map"
        ));
        assert_eq!(requests[2], Request::Step { count: 8 });
        assert_eq!(requests[3], Request::Observe);
    }

    #[test]
    fn test_engine_error_response() {
        let mut conn = connection(&[Response::error("replay version unsupported")]);
        let err = conn.replay_info(b"x").unwrap_err();
        assert!(matches!(err, CoreError::Engine(m) if m == "replay version unsupported"));
    }

    #[test]
    fn test_unexpected_response() {
        let mut conn = connection(&[Response::Started]);
        let err = conn.observe().unwrap_err();
        assert!(err.to_string().contains("unexpected 'started' response to 'observe'"));
    }

    #[test]
    fn test_closed_connection() {
        let mut conn = connection(&[]);
        let err = conn.step(8).unwrap_err();
        assert!(err.to_string().contains("closed the connection"));
    }

    #[test]
    fn test_malformed_response() {
        let mut conn =
            EngineConnection::new(Cursor::new(b"not json\n".to_vec()), Vec::<u8>::new());
        assert!(conn.game_info().is_err());
    }

    #[test]
    fn test_launch_missing_program() {
        let launcher = ProcessLauncher::new(EngineCommand {
            program: "/nonexistent/engine-binary".to_string(),
            args: Vec::new(),
        });
        let err = launcher.launch().unwrap_err();
        assert!(err.to_string().contains("spawning"));
    }

    #[cfg(unix)]
    #[test]
    fn test_reap_kills_running_process() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let status = reap(&mut child).unwrap();
        assert!(!status.success());
        assert!(matches!(child.try_wait(), Ok(Some(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_reap_exited_process() {
        let mut child = Command::new("true").spawn().unwrap();
        child.wait().unwrap();
        assert!(reap(&mut child).unwrap().success());
    }
}
