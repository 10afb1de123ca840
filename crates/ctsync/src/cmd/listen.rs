use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ctsync_channel::{Multichannel, ReadSet};
use ctsync_wire::{split_messages, MessageAssembler, MAX_MESSAGE_SIZE};
use tracing::{debug, info, warn};

use crate::cmd::ListenArgs;
use crate::config;
use crate::exit::{channel_error, io_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_message, OutputFormat};
use crate::view::MessageView;

/// Upper bound on one wait so Ctrl-C is noticed promptly.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let confs = config::load(&args.config)?;
    let mut channels =
        Multichannel::open(&confs).map_err(|err| channel_error("open failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut sink = Printer {
        format,
        printed: 0,
        limit: args.count,
    };
    let mut streams: Vec<StreamState> = channels
        .channels()
        .iter()
        .map(|c| StreamState::new(c.peer_generation()))
        .collect();
    let mut buf = vec![0u8; MAX_MESSAGE_SIZE];
    let mut set = ReadSet::new();

    info!(channels = channels.len(), "listening");
    while running.load(Ordering::SeqCst) && !sink.done() {
        set.clear();
        channels.register(&mut set);
        if set.wait(Some(POLL_INTERVAL)).map_err(|err| io_error("poll failed", err))? == 0 {
            continue;
        }

        match channels.accept_ready(&set) {
            Ok(0) => {}
            Ok(accepted) => debug!(accepted, "stream peers connected"),
            Err(err) => warn!(error = %err, "accept failed"),
        }

        let Some((n, index)) = channels.recv_ready(&set, &mut buf) else {
            continue;
        };

        let generation = channels.channel(index).map_or(0, |c| c.peer_generation());
        let stream = channels.channel(index).is_some_and(|c| c.is_stream());
        if stream {
            let state = &mut streams[index];
            state.follow(generation);
            state.assembler.extend(&buf[..n]);
            loop {
                match state.assembler.next_message() {
                    Ok(Some(msg)) => sink.handle(&msg, index),
                    Ok(None) => break,
                    Err(err) => {
                        warn!(channel = index, error = %err, "stream lost framing, dropping peer");
                        if let Ok(true) = channels.disconnect_peer(index) {
                            let generation =
                                channels.channel(index).map_or(0, |c| c.peer_generation());
                            state.follow(generation);
                        }
                        state.assembler = MessageAssembler::new();
                        break;
                    }
                }
            }
        } else {
            let mut messages = split_messages(&buf[..n]);
            for msg in messages.by_ref() {
                match msg {
                    Ok(msg) => sink.handle(msg, index),
                    Err(err) => {
                        warn!(channel = index, error = %err, "dropping datagram");
                        break;
                    }
                }
            }
            let trailing = messages.remainder().len();
            if trailing > 0 {
                warn!(channel = index, trailing, "datagram ends in a partial message");
            }
        }
    }

    if args.stats {
        channels
            .stats(&mut io::stderr().lock())
            .map_err(|err| io_error("write failed", err))?;
    }
    Ok(SUCCESS)
}

/// Reassembly state of one stream member.
///
/// Bytes from one connection are never joined with bytes from another:
/// the assembler starts over whenever the peer generation moves.
struct StreamState {
    generation: u64,
    assembler: MessageAssembler,
}

impl StreamState {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            assembler: MessageAssembler::new(),
        }
    }

    fn follow(&mut self, generation: u64) {
        if generation == self.generation {
            return;
        }
        let discarded = self.assembler.buffered();
        if discarded > 0 {
            debug!(discarded, "discarding partial message from previous peer");
        }
        *self = Self::new(generation);
    }
}

/// Decodes and prints messages until an optional limit is reached.
struct Printer {
    format: OutputFormat,
    printed: usize,
    limit: Option<usize>,
}

impl Printer {
    fn done(&self) -> bool {
        self.limit.is_some_and(|limit| self.printed >= limit)
    }

    fn handle(&mut self, msg: &[u8], channel: usize) {
        if self.done() {
            return;
        }
        match MessageView::decode(msg) {
            Ok(view) => {
                print_message(&view.with_channel(channel), self.format);
                self.printed = self.printed.saturating_add(1);
            }
            Err(err) => warn!(channel, error = %err, "dropping malformed message"),
        }
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
