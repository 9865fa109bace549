use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use serde::{Deserialize, Serialize};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

use crate::catalog::TileDef;
use crate::engine::{Engine, EngineOptions};
use crate::event::{DrainDiag, Event};

// Collapses performed per chunk while a run loop is active. Kept at one so
// pause and init commands are honoured promptly between chunks.
const RUN_CHUNK: usize = 1;

/// Commands a host may send to the engine thread.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HostCommand {
    /// Cancel any in-flight loop, rebuild from scratch and stay paused.
    Init {
        /// Base tile catalog.
        tiles: Vec<TileDef>,
        /// Grid width in cells.
        grid_w: usize,
        /// Grid height in cells.
        grid_h: usize,
        /// Session options.
        opts: EngineOptions,
    },
    /// Start the chunked run loop.
    Run,
    /// Stop the run loop; acknowledged after the current chunk.
    Pause,
    /// Perform one bounded step, report, then pause.
    Step {
        /// Collapse budget for the step.
        collapses: usize,
    },
    /// Tear the worker down.
    Shutdown,
}

/// Execution modes mirrored to the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Waiting for commands.
    Paused,
    /// Chunked run loop in progress.
    Running,
    /// Executing a single host-requested step.
    Stepping,
    /// Generation finished; terminal.
    Done,
    /// Generation failed; terminal.
    Error,
}

/// One decided cell in a batch report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellTile {
    /// Flat cell index.
    pub cell: usize,
    /// Chosen variant index.
    pub tile: usize,
}

/// Aggregate counters accompanying a batch report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStats {
    /// Cells decided so far.
    pub collapsed: usize,
    /// Total cells in the grid.
    pub cells: usize,
    /// Variants in the expanded catalog.
    pub variants: usize,
    /// Cells waiting in the propagation queue.
    pub queue_size: usize,
    /// Cells still undecided.
    pub remaining: usize,
}

/// Messages the engine thread sends back to the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EngineMessage {
    /// Mode transition, with optional context.
    State {
        /// Current execution mode.
        mode: Mode,
        /// Collapse budget of an in-flight step, when stepping.
        target_collapses: Option<usize>,
        /// Human-readable context, when relevant.
        message: Option<String>,
    },
    /// Collapses from the latest chunk, already filtered of any the engine
    /// restarted away.
    Batch {
        /// Decided cells in collapse order.
        collapsed: Vec<CellTile>,
        /// Aggregate progress counters.
        stats: BatchStats,
    },
    /// Advisory drain diagnostics.
    Progress {
        /// Counters for the drain that was running.
        diag: DrainDiag,
    },
    /// The grid was reset; the host must discard in-flight collapses.
    Restart {
        /// Contradictions seen so far this session.
        attempt: u32,
    },
    /// Terminal success.
    Done,
    /// Terminal failure.
    Error {
        /// Human-readable failure description.
        message: String,
    },
}

/// Handle to an engine running on its own thread.
///
/// Commands are processed strictly in order; messages arrive in the order
/// the engine produced them. Dropping the handle shuts the thread down.
pub struct EngineWorker {
    commands: Sender<HostCommand>,
    messages: Receiver<EngineMessage>,
    thread: Option<JoinHandle<()>>,
}

impl EngineWorker {
    /// Spawn the engine thread, initially paused with no engine built.
    pub fn spawn() -> Self {
        let (command_tx, command_rx) = unbounded();
        let (message_tx, message_rx) = unbounded();
        let thread = thread::Builder::new()
            .name("tilewave-engine".into())
            .spawn(move || WorkerLoop::new(command_rx, message_tx).run())
            .expect("failed to spawn engine thread");
        Self {
            commands: command_tx,
            messages: message_rx,
            thread: Some(thread),
        }
    }

    /// Send a command to the engine thread.
    pub fn send(&self, command: HostCommand) {
        let _ = self.commands.send(command);
    }

    /// Get the message channel from the engine thread.
    pub fn messages(&self) -> &Receiver<EngineMessage> {
        &self.messages
    }
}

impl Drop for EngineWorker {
    fn drop(&mut self) {
        let _ = self.commands.send(HostCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

struct WorkerLoop {
    commands: Receiver<HostCommand>,
    messages: Sender<EngineMessage>,
    engine: Option<Engine>,
    mode: Mode,
}

impl WorkerLoop {
    fn new(commands: Receiver<HostCommand>, messages: Sender<EngineMessage>) -> Self {
        Self {
            commands,
            messages,
            engine: None,
            mode: Mode::Paused,
        }
    }

    fn run(mut self) {
        loop {
            if self.mode == Mode::Running {
                // Poll so run chunks and commands interleave; a pending
                // command always wins over the next chunk.
                match self.commands.try_recv() {
                    Ok(command) => {
                        if self.handle(command) {
                            break;
                        }
                    }
                    Err(TryRecvError::Empty) => self.chunk(RUN_CHUNK),
                    Err(TryRecvError::Disconnected) => break,
                }
            } else {
                match self.commands.recv() {
                    Ok(command) => {
                        if self.handle(command) {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        }
        debug!("engine thread exiting");
    }

    // Returns true when the worker should shut down.
    fn handle(&mut self, command: HostCommand) -> bool {
        match command {
            HostCommand::Init {
                tiles,
                grid_w,
                grid_h,
                opts,
            } => match Engine::new(&tiles, grid_w, grid_h, opts) {
                Ok(engine) => {
                    self.engine = Some(engine);
                    self.set_mode(Mode::Paused, None, None);
                }
                Err(err) => {
                    self.engine = None;
                    self.send(EngineMessage::Error {
                        message: err.to_string(),
                    });
                    self.set_mode(Mode::Error, None, Some(err.to_string()));
                }
            },
            HostCommand::Run => {
                if self.terminal() || self.engine.is_none() {
                    debug!(mode = ?self.mode, "run command ignored");
                } else {
                    self.set_mode(Mode::Running, None, None);
                }
            }
            HostCommand::Pause => {
                if !self.terminal() {
                    self.set_mode(Mode::Paused, None, None);
                }
            }
            HostCommand::Step { collapses } => {
                if self.terminal() || self.engine.is_none() {
                    debug!(mode = ?self.mode, "step command ignored");
                } else {
                    self.set_mode(Mode::Stepping, Some(collapses), None);
                    self.chunk(collapses);
                    if !self.terminal() {
                        self.set_mode(Mode::Paused, None, None);
                    }
                }
            }
            HostCommand::Shutdown => return true,
        }
        false
    }

    fn chunk(&mut self, collapses: usize) {
        let Some(engine) = self.engine.as_mut() else {
            warn!("chunk requested before init");
            self.mode = Mode::Paused;
            return;
        };
        let events = engine.step(collapses).to_vec();
        let stats = BatchStats {
            collapsed: engine.collapsed_count(),
            cells: engine.cells(),
            variants: engine.num_variants(),
            queue_size: engine.queue_len(),
            remaining: engine.cells() - engine.collapsed_count(),
        };

        let mut batch = Vec::new();
        for event in events {
            match event {
                Event::Collapse { cell, tile } => batch.push(CellTile { cell, tile }),
                Event::Restart { attempt } => {
                    // Those collapses never happened as far as the host is
                    // concerned.
                    batch.clear();
                    self.send(EngineMessage::Restart { attempt });
                }
                Event::Progress { diag } => self.send(EngineMessage::Progress { diag }),
                Event::Done => {
                    self.flush_batch(&mut batch, stats);
                    self.send(EngineMessage::Done);
                    self.set_mode(Mode::Done, None, None);
                }
                Event::Error { message } => {
                    self.flush_batch(&mut batch, stats);
                    self.send(EngineMessage::Error {
                        message: message.clone(),
                    });
                    self.set_mode(Mode::Error, None, Some(message));
                }
            }
        }
        self.flush_batch(&mut batch, stats);
    }

    fn flush_batch(&self, batch: &mut Vec<CellTile>, stats: BatchStats) {
        if !batch.is_empty() {
            self.send(EngineMessage::Batch {
                collapsed: std::mem::take(batch),
                stats,
            });
        }
    }

    fn terminal(&self) -> bool {
        matches!(self.mode, Mode::Done | Mode::Error)
    }

    fn set_mode(&mut self, mode: Mode, target_collapses: Option<usize>, message: Option<String>) {
        self.mode = mode;
        self.send(EngineMessage::State {
            mode,
            target_collapses,
            message,
        });
    }

    fn send(&self, message: EngineMessage) {
        let _ = self.messages.send(message);
    }
}
