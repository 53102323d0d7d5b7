//! End-to-end run in assembly-line mode: one left pass, then a graceful drain.
//!
//! Forks real workers over System V queues; one scenario per test binary so
//! the master owns the process's signal handlers.
#![cfg(target_os = "linux")]

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use pipevisor::{Message, Mode, Outcome, PipelineConfig, Supervisor};

const LINES: u64 = 50;

fn config(dir: &std::path::Path) -> PipelineConfig {
    PipelineConfig {
        name: "non-daemon".into(),
        mode: Mode::ASSEMBLY_LINE,
        left_process: 3,
        center_process: 2,
        right_process: 1,
        max_executions: 20,
        queue_name: format!("pipevisor-test-{}", uuid::Uuid::new_v4()),
        temp_dir: dir.to_path_buf(),
        tick_ms: 50,
        ..PipelineConfig::default()
    }
}

#[test]
fn every_produced_message_is_delivered_or_still_queued() {
    let dir = tempfile::tempdir().unwrap();
    let sink: PathBuf = dir.path().join("sink.txt");
    let sink_for_right = sink.clone();

    let sup = Supervisor::builder(config(dir.path()))
        .on_left_start(|w| {
            for n in 0..LINES {
                w.input_queue().push_wait(&Message::json(&n)?)?;
            }
            Ok(())
        })
        .on_center_message(|w, msg| {
            let n: u64 = msg.decode_json()?;
            w.output_queue().push_wait(&Message::json(&(n * 2))?)?;
            Ok(())
        })
        .on_right_message(move |_, msg| {
            let n: u64 = msg.decode_json()?;
            let mut f = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&sink_for_right)?;
            f.write_all(format!("{n}\n").as_bytes())?;
            Ok(())
        })
        .build()
        .unwrap();

    // Normalized: assembly-line runs exactly one producer.
    assert_eq!(sup.config().left_process, 1);
    let output = sup.output_queue().clone();
    let input = sup.input_queue().clone();

    let report = sup.run().unwrap();
    assert_eq!(report.outcome, Outcome::Stopped);
    assert!(report.abandoned.is_empty());

    let mut seen: Vec<u64> = fs::read_to_string(&sink)
        .unwrap_or_default()
        .lines()
        .map(|l| l.parse().unwrap())
        .collect();
    while output.len().unwrap() > 0 {
        if let Some(msg) = output.pop().unwrap() {
            seen.push(msg.decode_json().unwrap());
        }
    }
    seen.sort_unstable();

    let expected: Vec<u64> = (0..LINES).map(|n| n * 2).collect();
    assert_eq!(seen, expected);

    input.destroy().unwrap();
    output.destroy().unwrap();
}
