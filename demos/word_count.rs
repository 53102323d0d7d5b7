//! # Example: word_count
//!
//! A daemon pipeline that counts words in generated text.
//!
//! Shows how to:
//! - Load a [`PipelineConfig`] from TOML.
//! - Bind one handler per role and move JSON payloads between stages.
//! - Poll [`Worker::should_stop`] in a long-running producer.
//! - Attach [`LogWriter`] and a custom [`Subscribe`] implementation.
//!
//! ## Flow
//! ```text
//! left   ── "the quick brown fox" ──► input queue
//! center ── pop, count words      ──► output queue ── {"line": 7, "words": 4}
//! right  ── pop, add to its tally, print every 100 lines
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example word_count --features logging -- demos/word_count.toml
//! # in another shell:
//! kill -TERM <master pid>   # graceful stop: left drains, queues empty, then exit
//! kill -USR1 <master pid>   # smooth restart: master exits within two ticks
//! ```

use std::cell::Cell;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pipevisor::logging::{self, LogConfig, LogFormat};
use pipevisor::{
    Event, EventKind, LogWriter, Message, PipelineConfig, Subscribe, Supervisor, Worker,
};
use serde::{Deserialize, Serialize};

const TEXT: &[&str] = &[
    "the quick brown fox jumps over the lazy dog",
    "pack my box with five dozen liquor jugs",
    "how vexingly quick daft zebras jump",
    "sphinx of black quartz judge my vow",
];

#[derive(Serialize, Deserialize)]
struct Count {
    line: u64,
    words: usize,
}

/// Counts worker exits by outcome and prints a line when the master leaves.
#[derive(Default)]
struct ExitCounter {
    clean: AtomicUsize,
    failed: AtomicUsize,
}

#[async_trait::async_trait]
impl Subscribe for ExitCounter {
    async fn on_event(&self, ev: &Event) {
        match ev.kind {
            EventKind::WorkerExited if ev.exit_code == Some(0) => {
                self.clean.fetch_add(1, Ordering::Relaxed);
            }
            EventKind::WorkerExited => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
            EventKind::MasterExiting => {
                println!(
                    "[exits] clean={} failed={} outcome={}",
                    self.clean.load(Ordering::Relaxed),
                    self.failed.load(Ordering::Relaxed),
                    ev.reason.as_deref().unwrap_or("-"),
                );
            }
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "exit-counter"
    }
}

fn produce(w: &Worker) -> anyhow::Result<()> {
    let mut line = 0u64;
    while !w.should_stop() {
        let text = TEXT[line as usize % TEXT.len()];
        w.input_queue().push_wait(&Message::from(text))?;
        line += 1;
        if line % 1000 == 0 {
            std::thread::sleep(std::time::Duration::from_millis(50));
        }
    }
    Ok(())
}

thread_local! {
    static SEEN: Cell<u64> = const { Cell::new(0) };
    static TALLY: Cell<usize> = const { Cell::new(0) };
}

fn count(w: &Worker, msg: &Message) -> anyhow::Result<()> {
    let text = msg
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("payload is not UTF-8"))?;
    let line = SEEN.with(|seen| {
        seen.set(seen.get() + 1);
        seen.get()
    });
    let out = Count {
        line,
        words: text.split_whitespace().count(),
    };
    w.output_queue().push_wait(&Message::json(&out)?)?;
    Ok(())
}

fn tally(w: &Worker, msg: &Message) -> anyhow::Result<()> {
    let c: Count = msg.decode_json()?;
    let total = TALLY.with(|t| {
        t.set(t.get() + c.words);
        t.get()
    });
    if c.line % 100 == 0 {
        println!(
            "[{} #{} pid={}] words so far: {total}",
            w.role(),
            w.worker_id(),
            w.worker_pid()
        );
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init(
        LogConfig::default()
            .with_format(LogFormat::Compact)
            .with_env_overrides(),
    );

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "demos/word_count.toml".to_string());
    let cfg = PipelineConfig::from_toml_file(&path)?;

    let subs: Vec<Arc<dyn Subscribe>> = vec![
        Arc::new(LogWriter::new()),
        Arc::new(ExitCounter::default()),
    ];

    let report = Supervisor::builder(cfg)
        .with_subscribers(subs)
        .on_left_start(produce)
        .on_center_message(count)
        .on_right_message(tally)
        .build()?
        .run()?;

    println!(
        "master done: outcome={:?} ticks={} abandoned={:?}",
        report.outcome, report.ticks, report.abandoned
    );
    Ok(())
}
