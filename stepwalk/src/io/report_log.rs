//! Report artifacts: a JSONL event stream and a final scenario report file.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Serialize;

use crate::io::config::write_atomic;
use crate::walker::{EventSink, NodeReport, ScenarioReport};

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Event<'a> {
    Node(&'a NodeReport),
    Scenario(&'a ScenarioReport),
}

/// Event sink writing one JSON object per line.
///
/// Write errors are held until [`JsonlSink::finish`]; events after the first
/// failure are dropped.
pub struct JsonlSink {
    path: PathBuf,
    writer: BufWriter<File>,
    error: Option<anyhow::Error>,
}

impl JsonlSink {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            error: None,
        })
    }

    fn write_event(&mut self, event: &Event<'_>) {
        if self.error.is_some() {
            return;
        }
        let result = serde_json::to_writer(&mut self.writer, event)
            .map_err(anyhow::Error::from)
            .and_then(|()| self.writer.write_all(b"\n").map_err(anyhow::Error::from));
        if let Err(err) = result {
            self.error = Some(err.context(format!("write {}", self.path.display())));
        }
    }

    /// Flush buffered events and surface the first write error, if any.
    pub fn finish(mut self) -> Result<()> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.writer
            .flush()
            .with_context(|| format!("flush {}", self.path.display()))
    }
}

impl EventSink for JsonlSink {
    fn node_finished(&mut self, report: &NodeReport) {
        self.write_event(&Event::Node(report));
    }

    fn scenario_finished(&mut self, report: &ScenarioReport) {
        self.write_event(&Event::Scenario(report));
    }
}

/// Forwards every event to two sinks.
pub struct Tee<'a, A: EventSink + ?Sized, B: EventSink + ?Sized> {
    pub first: &'a mut A,
    pub second: &'a mut B,
}

impl<A: EventSink + ?Sized, B: EventSink + ?Sized> EventSink for Tee<'_, A, B> {
    fn node_finished(&mut self, report: &NodeReport) {
        self.first.node_finished(report);
        self.second.node_finished(report);
    }

    fn scenario_finished(&mut self, report: &ScenarioReport) {
        self.first.scenario_finished(report);
        self.second.scenario_finished(report);
    }
}

/// Full outcome of one scenario, as written to a report file.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub scenario: ScenarioReport,
    pub nodes: Vec<NodeReport>,
}

/// Atomically write `report` as pretty JSON.
pub fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(report).context("serialize report")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// Parse a JSONL event file back into values, one per line.
pub fn read_events(path: &Path) -> Result<Vec<serde_json::Value>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    contents
        .lines()
        .enumerate()
        .map(|(index, line)| {
            serde_json::from_str(line)
                .map_err(|err| anyhow!("{}:{}: {err}", path.display(), index + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ScenarioStatus, Severity};
    use crate::hooks::NoHooks;
    use crate::test_support::{ScriptedAction, resolved, scenario, step};
    use crate::walker::{RecordingSink, WalkOptions, Walker};

    #[test]
    fn jsonl_sink_writes_one_line_per_event() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("events").join("run.jsonl");
        let ok = ScriptedAction::passing("ok");
        let boom = ScriptedAction::failing("boom", "kaput");
        let (mut tree, _) = scenario(
            "Events",
            vec![
                step("a", 0, &[], resolved(&ok)),
                step("b", 0, &[], resolved(&boom)),
            ],
        );

        let mut sink = JsonlSink::create(&path).expect("create");
        let mut recording = RecordingSink::default();
        let mut tee = Tee {
            first: &mut sink,
            second: &mut recording,
        };
        Walker::new(&NoHooks, WalkOptions::default()).run(&mut tree, &mut tee);
        sink.finish().expect("finish");

        let events = read_events(&path).expect("read");
        assert_eq!(events.len(), 3);
        assert_eq!(events[0]["event"], "node");
        assert_eq!(events[0]["status"], "passed");
        assert_eq!(events[1]["error"], "kaput");
        assert_eq!(events[2]["event"], "scenario");
        assert_eq!(events[2]["status"], "failed");
        assert_eq!(recording.nodes.len(), 2);
    }

    #[test]
    fn write_report_replaces_atomically() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("report.json");
        let report = RunReport {
            scenario: ScenarioReport {
                name: "s".to_string(),
                status: ScenarioStatus::Passed,
                severity: Severity::None,
                executed: 0,
                skipped: 0,
                duration_ms: 0,
            },
            nodes: Vec::new(),
        };
        write_report(&path, &report).expect("write");
        write_report(&path, &report).expect("rewrite");

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(value["scenario"]["status"], "passed");
        assert!(!temp.path().join("report.json.tmp").exists());
    }
}
