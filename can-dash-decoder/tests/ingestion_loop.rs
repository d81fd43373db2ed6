// Drives the ingestion loop against a scripted bus
use can_dash_decoder::{
    BusConnector, CancellationToken, ConnectionError, DashConfig, DashEvent, EventSink,
    FrameProcessor, FrameSource, IngestionLoop, RawFrame, ReconnectPolicy,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Clone, Default)]
struct RecordingSink {
    events: Arc<Mutex<Vec<DashEvent>>>,
}

impl RecordingSink {
    fn events(&self) -> Vec<DashEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: DashEvent) {
        self.events.lock().unwrap().push(event);
    }
}

enum Step {
    Frame(RawFrame),
    Idle,
    Drop,
}

struct ScriptedHandle {
    steps: VecDeque<Step>,
    cancel: CancellationToken,
}

impl FrameSource for ScriptedHandle {
    fn receive(&mut self) -> Result<Option<RawFrame>, ConnectionError> {
        match self.steps.pop_front() {
            Some(Step::Frame(frame)) => Ok(Some(frame)),
            Some(Step::Idle) => Ok(None),
            Some(Step::Drop) => Err(ConnectionError::LinkDown("vcan0".into())),
            None => {
                // Script finished: stop the loop
                self.cancel.cancel();
                Ok(None)
            }
        }
    }
}

/// Each entry is one connect attempt: `None` fails, `Some` succeeds with a script
struct ScriptedConnector {
    attempts: VecDeque<Option<Vec<Step>>>,
    cancel: CancellationToken,
}

impl BusConnector for ScriptedConnector {
    type Handle = ScriptedHandle;

    fn connect(&mut self) -> Result<ScriptedHandle, ConnectionError> {
        match self.attempts.pop_front() {
            Some(Some(steps)) => Ok(ScriptedHandle {
                steps: steps.into(),
                cancel: self.cancel.clone(),
            }),
            Some(None) => Err(ConnectionError::NoDevice("vcan0".into())),
            None => {
                self.cancel.cancel();
                Err(ConnectionError::NoDevice("vcan0".into()))
            }
        }
    }

    fn describe(&self) -> String {
        "vcan0 (scripted)".to_string()
    }
}

fn run_script(attempts: Vec<Option<Vec<Step>>>) -> (Vec<DashEvent>, can_dash_decoder::IngestStats) {
    let _ = env_logger::builder().is_test(true).try_init();

    let cancel = CancellationToken::new();
    let connector = ScriptedConnector {
        attempts: attempts.into(),
        cancel: cancel.clone(),
    };
    let sink = RecordingSink::default();
    let ingest = IngestionLoop::new(
        connector,
        FrameProcessor::from_config(&DashConfig::default()),
        sink.clone(),
    )
    .with_reconnect_policy(ReconnectPolicy::busy_retry())
    .with_cancellation(cancel);

    let stats = ingest.run();
    (sink.events(), stats)
}

fn motion_frame() -> RawFrame {
    // 3000 rpm, 64 km/h
    RawFrame::new(0x108, [0x00, 0x04, 0x93, 0xE0, 0x20, 0x00, 0x00, 0x00])
}

fn engine_frame() -> RawFrame {
    RawFrame::new(0x145, [0b0000_0011, 0x00, 0x00, 128, 0x00, 0x00, 0x00, 0x00])
}

#[test]
fn test_failures_then_success_emit_single_online() {
    let (events, stats) = run_script(vec![None, None, None, Some(vec![])]);

    assert_eq!(events, vec![DashEvent::CanOnline(true)]);
    assert_eq!(stats.connect_attempts, 4);
    assert_eq!(stats.frames_received, 0);
    assert_eq!(stats.disconnects, 0);
}

#[test]
fn test_unknown_identifier_between_known_frames() {
    let (events, stats) = run_script(vec![Some(vec![
        Step::Frame(motion_frame()),
        Step::Frame(RawFrame::new(0x123, [0xFF; 8])),
        Step::Frame(engine_frame()),
    ])]);

    assert_eq!(
        events,
        vec![
            DashEvent::CanOnline(true),
            DashEvent::Speed(64.0),
            DashEvent::Rpm(3000),
            DashEvent::EngineTemp(88),
            DashEvent::EngineRunning(true),
            DashEvent::CruiseControlActive(true),
        ]
    );
    assert_eq!(stats.frames_received, 3);
    assert_eq!(stats.frames_decoded, 2);
    assert_eq!(stats.frames_ignored, 1);
}

#[test]
fn test_short_payload_does_not_stop_the_loop() {
    let (events, stats) = run_script(vec![Some(vec![
        Step::Frame(RawFrame::new(0x108, [0x00, 0x04, 0x93, 0xE0, 0x20])),
        Step::Frame(RawFrame::new(0x445, [0x00, 100])),
    ])]);

    assert_eq!(
        events,
        vec![DashEvent::CanOnline(true), DashEvent::AirTemp(10.0)]
    );
    assert_eq!(stats.frames_malformed, 1);
    assert_eq!(stats.frames_decoded, 1);
}

#[test]
fn test_link_drop_reconnects() {
    let (events, stats) = run_script(vec![
        Some(vec![Step::Frame(RawFrame::new(0x375, [0x00, 52])), Step::Idle, Step::Drop]),
        None,
        Some(vec![Step::Frame(RawFrame::new(0x375, [0x00, 26]))]),
    ]);

    assert_eq!(
        events,
        vec![
            DashEvent::CanOnline(true),
            DashEvent::FuelPercentage(100.0),
            DashEvent::CanOnline(false),
            DashEvent::CanOnline(true),
            DashEvent::FuelPercentage(50.0),
        ]
    );
    assert_eq!(stats.disconnects, 1);
    assert_eq!(stats.connect_attempts, 3);
}

#[test]
fn test_steering_wheel_events_share_timestamp() {
    let (events, _) = run_script(vec![Some(vec![Step::Frame(RawFrame::new(
        0x206,
        [0b0010_0100],
    ))])]);

    let controls: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            DashEvent::SteeringWheelControl(c) => Some(*c),
            _ => None,
        })
        .collect();
    assert_eq!(controls.len(), 2);
    assert_eq!(controls[0].control.bit(), 2);
    assert_eq!(controls[1].control.bit(), 5);
    assert_eq!(controls[0].time, controls[1].time);
}

#[test]
fn test_cancelled_before_start_never_connects() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let connector = ScriptedConnector {
        attempts: vec![Some(vec![])].into(),
        cancel: cancel.clone(),
    };
    let sink = RecordingSink::default();
    let stats = IngestionLoop::new(
        connector,
        FrameProcessor::from_config(&DashConfig::default()),
        sink.clone(),
    )
    .with_cancellation(cancel)
    .run();

    assert!(sink.events().is_empty());
    assert_eq!(stats.connect_attempts, 0);
}

#[test]
fn test_spawned_loop_stops_on_cancel() {
    struct SilentHandle;

    impl FrameSource for SilentHandle {
        fn receive(&mut self) -> Result<Option<RawFrame>, ConnectionError> {
            std::thread::sleep(Duration::from_millis(5));
            Ok(None)
        }
    }

    struct SilentConnector;

    impl BusConnector for SilentConnector {
        type Handle = SilentHandle;

        fn connect(&mut self) -> Result<SilentHandle, ConnectionError> {
            Ok(SilentHandle)
        }

        fn describe(&self) -> String {
            "silent".to_string()
        }
    }

    let (tx, rx) = std::sync::mpsc::channel();
    let ingest = IngestionLoop::new(
        SilentConnector,
        FrameProcessor::from_config(&DashConfig::default()),
        tx,
    );
    let cancel = ingest.cancellation_token();
    let handle = ingest.spawn().unwrap();

    assert_eq!(
        rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        DashEvent::CanOnline(true)
    );
    cancel.cancel();
    let stats = handle.join().unwrap();
    assert_eq!(stats.connect_attempts, 1);
    assert_eq!(stats.frames_received, 0);
}

/// Records when each connect attempt happened, then follows a script like
/// `ScriptedConnector`
struct TimedConnector {
    inner: ScriptedConnector,
    attempt_times: Arc<Mutex<Vec<Instant>>>,
}

impl BusConnector for TimedConnector {
    type Handle = ScriptedHandle;

    fn connect(&mut self) -> Result<ScriptedHandle, ConnectionError> {
        self.attempt_times.lock().unwrap().push(Instant::now());
        self.inner.connect()
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}

#[test]
fn test_backoff_resets_after_successful_connect() {
    let cancel = CancellationToken::new();
    let attempt_times = Arc::new(Mutex::new(Vec::new()));
    let connector = TimedConnector {
        inner: ScriptedConnector {
            // 50, 100, 200 ms of backoff, then online, drop, one failure, online
            attempts: vec![
                None,
                None,
                None,
                Some(vec![Step::Drop]),
                None,
                Some(vec![]),
            ]
            .into(),
            cancel: cancel.clone(),
        },
        attempt_times: Arc::clone(&attempt_times),
    };
    let sink = RecordingSink::default();
    let stats = IngestionLoop::new(
        connector,
        FrameProcessor::from_config(&DashConfig::default()),
        sink.clone(),
    )
    .with_reconnect_policy(ReconnectPolicy::exponential(50, 400))
    .with_cancellation(cancel)
    .run();

    assert_eq!(stats.connect_attempts, 6);
    assert_eq!(stats.disconnects, 1);
    assert_eq!(
        sink.events(),
        vec![
            DashEvent::CanOnline(true),
            DashEvent::CanOnline(false),
            DashEvent::CanOnline(true),
        ]
    );

    let times = attempt_times.lock().unwrap();
    let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();

    // Doubling before the first connect
    assert!(gaps[0] >= Duration::from_millis(50));
    assert!(gaps[1] >= Duration::from_millis(100));
    assert!(gaps[2] >= Duration::from_millis(200));

    // After the link drop the delay starts over at the initial value
    assert!(gaps[4] >= Duration::from_millis(50));
    assert!(gaps[4] < Duration::from_millis(200), "backoff not reset: {:?}", gaps[4]);
}

#[test]
fn test_cancel_during_backoff_returns_promptly() {
    struct FailingConnector;

    impl BusConnector for FailingConnector {
        type Handle = ScriptedHandle;

        fn connect(&mut self) -> Result<ScriptedHandle, ConnectionError> {
            Err(ConnectionError::NoDevice("vcan0".into()))
        }

        fn describe(&self) -> String {
            "vcan0 (absent)".to_string()
        }
    }

    let ingest = IngestionLoop::new(
        FailingConnector,
        FrameProcessor::from_config(&DashConfig::default()),
        RecordingSink::default(),
    )
    .with_reconnect_policy(ReconnectPolicy::exponential(10_000, 10_000));
    let cancel = ingest.cancellation_token();
    let handle = ingest.spawn().unwrap();

    // Let the first attempt fail and the loop enter its 10 s backoff
    std::thread::sleep(Duration::from_millis(100));
    let cancelled_at = Instant::now();
    cancel.cancel();
    let stats = handle.join().unwrap();

    assert!(cancelled_at.elapsed() < Duration::from_secs(1));
    assert_eq!(stats.connect_attempts, 1);
}
