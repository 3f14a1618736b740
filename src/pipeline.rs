use crate::{
    action::{Action, ActionTable},
    classify::Classifier,
    dispatch::Dispatch,
    error::Error,
    moves::MoveSet,
    pose::{Landmark, LandmarkKind, Snapshot},
};
use indicatif::ProgressBar;
use std::{
    io::{BufRead, Write},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        mpsc::{sync_channel, TrySendError},
        Arc,
    },
    time::{Duration, Instant},
};
use tracing::{debug, trace, warn};

#[derive(Debug, serde::Deserialize)]
struct RawLandmark {
    x: f32,
    y: f32,
    #[serde(default)]
    visibility: f32,
}

#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum RawSnapshot {
    Bare(Vec<RawLandmark>),
    Wrapped { landmarks: Vec<RawLandmark> },
}

/// Parse one line of estimator output: either a bare array of landmarks in
/// vocabulary order or an object with a `landmarks` array.
pub(crate) fn parse_snapshot<L>(line: L) -> Result<Snapshot, Error>
where
    L: AsRef<[u8]>,
{
    let raw = match serde_json::from_slice(line.as_ref()).map_err(Error::ParseSnapshot)? {
        RawSnapshot::Bare(landmarks) | RawSnapshot::Wrapped { landmarks } => landmarks,
    };
    let landmarks = raw
        .into_iter()
        .map(|RawLandmark { x, y, visibility }| Landmark::new(x, y, visibility))
        .collect::<Result<Vec<_>, _>>()?;
    Snapshot::try_from(landmarks)
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub(crate) struct Report {
    pub(crate) frame: usize,
    pub(crate) moves: MoveSet,
    pub(crate) actions: Vec<Action>,
}

#[derive(Debug, Copy, Clone, Default)]
pub(crate) struct Timing {
    pub(crate) classification: Duration,
}

/// Classifies snapshots, maps the moves to actions and hands them to the
/// dispatcher.
pub(crate) struct Translator<D> {
    classifier: Classifier,
    actions: Arc<ActionTable>,
    excluded: Vec<LandmarkKind>,
    dispatcher: D,
    pub(crate) timing: Timing,
}

impl<D> Translator<D>
where
    D: Dispatch,
{
    pub(crate) fn new(
        classifier: Classifier,
        actions: Arc<ActionTable>,
        excluded: Vec<LandmarkKind>,
        dispatcher: D,
    ) -> Self {
        Self {
            classifier,
            actions,
            excluded,
            dispatcher,
            timing: Default::default(),
        }
    }

    pub(crate) fn translate(&mut self, frame: usize, snapshot: &Snapshot) -> Report {
        let start = Instant::now();
        let snapshot = snapshot.exclude(&self.excluded);
        let moves = self.classifier.classify(&snapshot);
        let actions = self.actions.map_moves(&moves);
        self.timing.classification += start.elapsed();

        debug!(frame, count = moves.len(), %moves, "classified");

        if let Err(e) = self.dispatcher.dispatch(&actions) {
            warn!(frame, error = %e, "failed dispatching actions");
        }

        Report {
            frame,
            moves,
            actions,
        }
    }

    #[cfg(test)]
    pub(crate) fn dispatcher(&self) -> &D {
        &self.dispatcher
    }
}

/// What the reader does with a snapshot that arrives while the previous one
/// is still being classified.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Handoff {
    /// Skip it; keeps input latency bounded on a live feed.
    DropWhenBusy,
    /// Wait for the classifier; for replaying recorded snapshots.
    Block,
}

#[derive(Debug, Default)]
struct Counters {
    read: AtomicUsize,
    dropped: AtomicUsize,
    malformed: AtomicUsize,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub(crate) struct Summary {
    pub(crate) read: usize,
    pub(crate) classified: usize,
    pub(crate) dropped: usize,
    pub(crate) malformed: usize,
}

fn read_snapshots<R, F>(
    input: R,
    running: &AtomicBool,
    counters: &Counters,
    mut send: F,
) -> Result<(), Error>
where
    R: BufRead,
    F: FnMut(usize, Snapshot) -> bool,
{
    // raw bytes: a line that is not UTF-8 is malformed, not a read failure
    for (line_number, line) in input.split(b'\n').enumerate() {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let line = line.map_err(Error::ReadInput)?;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let snapshot = match parse_snapshot(&line) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                counters.malformed.fetch_add(1, Ordering::SeqCst);
                warn!(line = line_number + 1, error = %e, "skipping malformed snapshot");
                continue;
            }
        };
        let frame = counters.read.fetch_add(1, Ordering::SeqCst);
        if !send(frame, snapshot) {
            break;
        }
    }
    Ok(())
}

fn write_report<W>(output: &mut W, report: &Report) -> Result<(), Error>
where
    W: Write,
{
    serde_json::to_writer(&mut *output, report).map_err(Error::SerializeReport)?;
    writeln!(output).map_err(Error::WriteReport)?;
    output.flush().map_err(Error::WriteReport)
}

fn report_progress(progress: &ProgressBar, timing: Timing, summary: Summary) {
    let fps = summary.classified as f64 / timing.classification.as_secs_f64().max(f64::EPSILON);
    progress.set_message(format!(
        "FPS => classify: {:.1}, frames: {}, dropped: {}",
        fps, summary.classified, summary.dropped,
    ));
    progress.inc(1);
}

/// Reads snapshots on one thread and translates them on the calling thread,
/// writing one JSON report per classified frame to `output`.
///
/// Both threads stop once `running` is cleared, but only after their pending
/// read or receive returns. On an interactive input with no further lines the
/// call does not return until the next line or end of input arrives.
pub(crate) fn run<R, W, D>(
    input: R,
    mut output: W,
    translator: &mut Translator<D>,
    running: &AtomicBool,
    handoff: Handoff,
    progress: Option<&ProgressBar>,
) -> Result<Summary, Error>
where
    R: BufRead + Send,
    W: Write,
    D: Dispatch,
{
    let counters = Counters::default();

    let classified = crossbeam::thread::scope(|scope| {
        // rendezvous channel: a snapshot is only handed over to an idle worker
        let (snapshots_tx, snapshots_rx) = sync_channel::<(usize, Snapshot)>(0);
        let counters = &counters;

        let reader = scope.spawn(move |_| {
            read_snapshots(input, running, counters, |frame, snapshot| match handoff {
                Handoff::Block => snapshots_tx.send((frame, snapshot)).is_ok(),
                Handoff::DropWhenBusy => match snapshots_tx.try_send((frame, snapshot)) {
                    Ok(()) => true,
                    Err(TrySendError::Full(_)) => {
                        counters.dropped.fetch_add(1, Ordering::SeqCst);
                        trace!(frame, "classifier busy, dropping snapshot");
                        true
                    }
                    Err(TrySendError::Disconnected(_)) => false,
                },
            })
        });

        let mut classified = 0;
        for (frame, snapshot) in snapshots_rx.iter() {
            if !running.load(Ordering::SeqCst) {
                break;
            }
            let report = translator.translate(frame, &snapshot);
            write_report(&mut output, &report)?;
            classified += 1;

            if let Some(progress) = progress {
                let summary = Summary {
                    classified,
                    dropped: counters.dropped.load(Ordering::SeqCst),
                    ..Summary::default()
                };
                report_progress(progress, translator.timing, summary);
            }
        }
        // unblocks a reader waiting in `send`
        drop(snapshots_rx);

        reader.join().map_err(|_| Error::ReaderPanicked)??;
        Ok::<_, Error>(classified)
    })
    .map_err(|_| Error::ReaderPanicked)??;

    Ok(Summary {
        read: counters.read.load(Ordering::SeqCst),
        classified,
        dropped: counters.dropped.load(Ordering::SeqCst),
        malformed: counters.malformed.load(Ordering::SeqCst),
    })
}

#[cfg(test)]
mod tests {
    use super::{parse_snapshot, run, Handoff, Summary, Translator};
    use crate::{
        action::ActionTable,
        classify::Classifier,
        config::{Tolerances, DEFAULT_VISIBILITY_THRESHOLD},
        dispatch::testing::{KeyEvent, Recorder},
        error::Error,
        moves::Move,
        pose::{
            constants::DEFAULT_EXCLUDED_LANDMARKS, fixtures, LandmarkKind, Snapshot,
            NUM_LANDMARKS,
        },
    };
    use assert_approx_eq::assert_approx_eq;
    use std::sync::{atomic::AtomicBool, Arc};

    fn to_json(snapshot: &Snapshot) -> serde_json::Value {
        (0..NUM_LANDMARKS)
            .map(|idx| {
                let landmark = snapshot.get(LandmarkKind::from_idx(idx).unwrap());
                serde_json::json!({
                    "x": landmark.point.x(),
                    "y": landmark.point.y(),
                    "visibility": landmark.visibility,
                })
            })
            .collect()
    }

    fn translator(excluded: &[LandmarkKind]) -> Translator<Recorder> {
        Translator::new(
            Classifier::new(DEFAULT_VISIBILITY_THRESHOLD, Tolerances::default()),
            Arc::new(ActionTable::default()),
            excluded.to_vec(),
            Recorder::default(),
        )
    }

    mod parse_snapshot_tests {
        use super::*;

        #[test]
        fn bare_array() {
            let line = to_json(&fixtures::guarding()).to_string();
            assert_eq!(parse_snapshot(&line).unwrap(), fixtures::guarding());
        }

        #[test]
        fn wrapped_object() {
            let line = serde_json::json!({ "landmarks": to_json(&fixtures::standing()) });
            assert_eq!(
                parse_snapshot(&line.to_string()).unwrap(),
                fixtures::standing()
            );
        }

        #[test]
        fn missing_visibility_is_zero() {
            let landmarks = vec![serde_json::json!({ "x": 0.5, "y": 0.5 }); NUM_LANDMARKS];
            let line = serde_json::Value::Array(landmarks).to_string();
            let snapshot = parse_snapshot(&line).unwrap();
            assert_approx_eq!(snapshot.get(LandmarkKind::Nose).visibility, 0.0);
        }

        #[test]
        fn too_few_landmarks() {
            let landmarks = vec![serde_json::json!({ "x": 0.5, "y": 0.5 }); 17];
            let line = serde_json::Value::Array(landmarks).to_string();
            assert!(matches!(
                parse_snapshot(&line),
                Err(Error::InvalidInput { got: 17, .. })
            ));
        }

        #[test]
        fn not_utf8() {
            assert!(matches!(
                parse_snapshot(b"\xff\xfe[]"),
                Err(Error::ParseSnapshot(_))
            ));
        }

        #[test]
        fn not_json() {
            assert!(matches!(
                parse_snapshot("nose: 0.5, 0.5"),
                Err(Error::ParseSnapshot(_))
            ));
        }
    }

    mod translator_tests {
        use super::*;

        #[test]
        fn moves_become_key_presses() {
            let mut translator = translator(&DEFAULT_EXCLUDED_LANDMARKS);
            let report = translator.translate(7, &fixtures::guarding());
            assert_eq!(report.frame, 7);
            assert_eq!(report.moves.iter().collect::<Vec<_>>(), vec![Move::Block]);
            assert_eq!(
                translator.dispatcher().events,
                vec![
                    KeyEvent::Down("space".to_owned()),
                    KeyEvent::Up("space".to_owned())
                ]
            );
        }

        #[test]
        fn excluded_landmarks_are_ignored() {
            let mut translator = translator(&[LandmarkKind::Nose]);
            let report = translator.translate(0, &fixtures::right_arm_overhead());
            assert!(report.moves.is_empty());
            assert!(report.actions.is_empty());
            assert!(translator.dispatcher().events.is_empty());
        }

        #[test]
        fn default_exclusions_keep_rule_landmarks() {
            let mut translator = translator(&DEFAULT_EXCLUDED_LANDMARKS);
            let report = translator.translate(0, &fixtures::right_arm_overhead());
            assert!(report.moves.contains(Move::Throw));
        }
    }

    mod run_tests {
        use super::*;

        fn input(snapshots: &[Snapshot], malformed: usize) -> String {
            let mut lines = snapshots
                .iter()
                .map(|snapshot| to_json(snapshot).to_string())
                .collect::<Vec<_>>();
            lines.extend(std::iter::repeat("{\"landmarks\": []}".to_owned()).take(malformed));
            lines.push(String::new());
            lines.join("\n")
        }

        #[test]
        fn blocking_replay_classifies_every_frame() {
            let input = input(
                &[
                    fixtures::standing(),
                    fixtures::left_leg_raised(),
                    fixtures::forearms_together(),
                ],
                1,
            );
            let mut output = Vec::new();
            let mut translator = translator(&DEFAULT_EXCLUDED_LANDMARKS);
            let running = AtomicBool::new(true);

            let summary = run(
                input.as_bytes(),
                &mut output,
                &mut translator,
                &running,
                Handoff::Block,
                None,
            )
            .unwrap();

            assert_eq!(
                summary,
                Summary {
                    read: 3,
                    classified: 3,
                    dropped: 0,
                    malformed: 1,
                }
            );

            let reports = String::from_utf8(output)
                .unwrap()
                .lines()
                .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap())
                .collect::<Vec<_>>();
            assert_eq!(
                reports,
                vec![
                    serde_json::json!({ "frame": 0, "moves": [], "actions": [] }),
                    serde_json::json!({ "frame": 1, "moves": ["FRONT_KICK"], "actions": ["z"] }),
                    serde_json::json!({ "frame": 2, "moves": ["TAG"], "actions": ["c"] }),
                ]
            );
        }

        #[test]
        fn invalid_utf8_line_is_skipped() {
            let mut input = b"\xff\xfe garbage\r\n".to_vec();
            input.extend(to_json(&fixtures::guarding()).to_string().into_bytes());
            input.extend(b"\r\n");
            let mut output = Vec::new();
            let mut translator = translator(&DEFAULT_EXCLUDED_LANDMARKS);
            let running = AtomicBool::new(true);

            let summary = run(
                input.as_slice(),
                &mut output,
                &mut translator,
                &running,
                Handoff::Block,
                None,
            )
            .unwrap();

            assert_eq!(
                summary,
                Summary {
                    read: 1,
                    classified: 1,
                    dropped: 0,
                    malformed: 1,
                }
            );
            let report: serde_json::Value =
                serde_json::from_slice(output.strip_suffix(b"\n").unwrap()).unwrap();
            assert_eq!(report["moves"], serde_json::json!(["BLOCK"]));
        }

        #[test]
        fn dropping_accounts_for_every_frame() {
            let snapshots = vec![fixtures::guarding(); 50];
            let input = input(&snapshots, 0);
            let mut output = Vec::new();
            let mut translator = translator(&DEFAULT_EXCLUDED_LANDMARKS);
            let running = AtomicBool::new(true);

            let summary = run(
                input.as_bytes(),
                &mut output,
                &mut translator,
                &running,
                Handoff::DropWhenBusy,
                None,
            )
            .unwrap();

            assert_eq!(summary.read, 50);
            assert_eq!(summary.classified + summary.dropped, 50);
            assert_eq!(
                String::from_utf8(output).unwrap().lines().count(),
                summary.classified
            );
        }

        #[test]
        fn stopped_pipeline_classifies_nothing() {
            let input = input(&[fixtures::guarding(), fixtures::guarding()], 0);
            let mut output = Vec::new();
            let mut translator = translator(&DEFAULT_EXCLUDED_LANDMARKS);
            let running = AtomicBool::new(false);

            let summary = run(
                input.as_bytes(),
                &mut output,
                &mut translator,
                &running,
                Handoff::Block,
                None,
            )
            .unwrap();

            assert_eq!(summary.classified, 0);
            assert!(output.is_empty());
            assert!(translator.dispatcher().events.is_empty());
        }
    }
}
