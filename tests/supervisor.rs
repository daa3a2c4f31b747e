use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rakevisor::device::{DeviceCall, Op};
use rakevisor::{
    ChangeSource, Config, DirectoryWatcher, Event, EventKind, FsChange, SimulatedDriver,
    Subscribe, Supervisor, Termination, deploy,
};
use tempfile::TempDir;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

const BOUND: Duration = Duration::from_secs(10);

#[derive(Default)]
struct Recorder(Mutex<Vec<Event>>);

impl Recorder {
    fn kinds(&self) -> Vec<EventKind> {
        self.0.lock().expect("lock").iter().map(|e| e.kind).collect()
    }

    fn count(&self, kind: EventKind) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }

    fn reasons(&self, kind: EventKind) -> Vec<String> {
        self.0
            .lock()
            .expect("lock")
            .iter()
            .filter(|e| e.kind == kind)
            .filter_map(|e| e.reason.as_deref().map(str::to_owned))
            .collect()
    }
}

#[async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, event: &Event) {
        self.0.lock().expect("lock").push(event.clone());
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

struct Station {
    dir: TempDir,
    driver: SimulatedDriver,
    gpio_low: Arc<AtomicBool>,
    events: Arc<Recorder>,
    shutdown: CancellationToken,
}

impl Station {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("tempdir"),
            driver: SimulatedDriver::new(),
            gpio_low: Arc::new(AtomicBool::new(false)),
            events: Arc::new(Recorder::default()),
            shutdown: CancellationToken::new(),
        }
    }

    fn config(&self) -> Config {
        Config {
            watch_dir: self.dir.path().to_path_buf(),
            data_folder: self.dir.path().join("data"),
            poll_interval: Duration::from_millis(5),
            wait_interval: Duration::from_millis(10),
            scan_interval: Duration::from_millis(10),
            ..Config::default()
        }
    }

    fn write_config(&self, name: &str, body: &str) {
        std::fs::write(self.dir.path().join(format!("{name}.json")), body).expect("write config");
    }

    fn start(&self) -> JoinHandle<Result<Termination, rakevisor::RuntimeError>> {
        self.start_with(self.config())
    }

    fn start_with(&self, cfg: Config) -> JoinHandle<Result<Termination, rakevisor::RuntimeError>> {
        let source = DirectoryWatcher::new(&cfg.watch_dir, cfg.scan_interval);
        self.start_watching(cfg, source)
    }

    fn start_watching(
        &self,
        cfg: Config,
        source: impl ChangeSource,
    ) -> JoinHandle<Result<Termination, rakevisor::RuntimeError>> {
        let gpio = Arc::clone(&self.gpio_low);
        let sup = Supervisor::builder(cfg, Arc::new(self.driver.clone()))
            .with_monitor(move || gpio.load(Ordering::SeqCst))
            .with_change_source(source)
            .with_subscribers(vec![self.events.clone() as Arc<dyn Subscribe>])
            .build();
        tokio::spawn(sup.run(self.shutdown.clone()))
    }

    fn starts(&self) -> usize {
        self.driver
            .journal()
            .iter()
            .filter(|c| matches!(c, DeviceCall::Start { .. }))
            .count()
    }
}

/// Watcher whose baseline scan starts late, as on a loaded station.
struct SlowStart {
    inner: DirectoryWatcher,
    delay: Duration,
}

#[async_trait]
impl ChangeSource for SlowStart {
    async fn run(
        &self,
        tx: mpsc::Sender<FsChange>,
        ready: oneshot::Sender<()>,
        stop: CancellationToken,
    ) {
        sleep(self.delay).await;
        self.inner.run(tx, ready, stop).await;
    }
}

async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let waited = timeout(BOUND, async {
        while !cond() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

async fn finish(handle: JoinHandle<Result<Termination, rakevisor::RuntimeError>>) -> Termination {
    timeout(BOUND, handle)
        .await
        .expect("supervisor terminates")
        .expect("no panic")
        .expect("supervisor ran")
}

#[tokio::test]
async fn redundant_marker_writes_start_exactly_one_run() {
    let st = Station::new();
    st.write_config("defaultconfig", "{}");
    let handle = st.start();
    sleep(Duration::from_millis(50)).await;

    deploy::write_deploy_marker(st.dir.path(), "defaultconfig").expect("deploy");
    wait_until("acquisition", || st.driver.is_acquiring()).await;

    for _ in 0..3 {
        sleep(Duration::from_millis(20)).await;
        deploy::write_deploy_marker(st.dir.path(), "defaultconfig").expect("redeploy");
    }
    sleep(Duration::from_millis(50)).await;
    st.driver.set_power_low(true);

    assert_eq!(finish(handle).await, Termination::VoltageLow);
    assert_eq!(st.starts(), 1);
    assert_eq!(st.events.count(EventKind::RunStarting), 1);
    assert_eq!(st.events.reasons(EventKind::VoltageLow), vec!["device"]);
    assert_eq!(st.driver.open_sessions(), 0);
    assert!(!st.driver.is_acquiring());
    assert_eq!(st.events.kinds().last(), Some(&EventKind::SupervisorStopped));
}

#[tokio::test]
async fn existing_marker_runs_at_startup_and_removal_stops_it() {
    let st = Station::new();
    st.write_config("defaultconfig", r#"{"averagecount": 4}"#);
    deploy::write_deploy_marker(st.dir.path(), "defaultconfig").expect("deploy");
    let handle = st.start();

    wait_until("acquisition", || st.driver.is_acquiring()).await;
    deploy::remove_deploy_marker(st.dir.path()).expect("undeploy");
    wait_until("run to finish", || st.events.count(EventKind::RunFinished) == 1).await;

    sleep(Duration::from_millis(50)).await;
    st.shutdown.cancel();
    assert_eq!(finish(handle).await, Termination::Shutdown);

    assert_eq!(st.starts(), 1);
    assert!(st.driver.journal().contains(&DeviceCall::Stop));
    assert_eq!(st.events.reasons(EventKind::RunFinished), vec!["run_cleared"]);
    assert_eq!(st.driver.open_sessions(), 0);
}

#[tokio::test]
async fn marker_written_before_the_watcher_baseline_still_runs() {
    let st = Station::new();
    st.write_config("defaultconfig", "{}");
    let cfg = st.config();
    let source = SlowStart {
        inner: DirectoryWatcher::new(&cfg.watch_dir, cfg.scan_interval),
        delay: Duration::from_millis(100),
    };
    let handle = st.start_watching(cfg, source);
    sleep(Duration::from_millis(30)).await;
    deploy::write_deploy_marker(st.dir.path(), "defaultconfig").expect("deploy");

    wait_until("acquisition", || st.driver.is_acquiring()).await;
    st.shutdown.cancel();
    assert_eq!(finish(handle).await, Termination::Shutdown);
    assert_eq!(st.starts(), 1);
}

#[tokio::test]
async fn gpio_low_while_idle_terminates_without_touching_the_device() {
    let st = Station::new();
    let handle = st.start();
    sleep(Duration::from_millis(30)).await;
    st.gpio_low.store(true, Ordering::SeqCst);

    assert_eq!(finish(handle).await, Termination::VoltageLow);
    assert!(st.driver.journal().is_empty());
    assert_eq!(st.events.reasons(EventKind::VoltageLow), vec!["gpio"]);
    assert_eq!(
        st.events.reasons(EventKind::SupervisorStopped),
        vec!["voltage_low"]
    );
}

#[tokio::test]
async fn shutdown_interrupts_an_active_run() {
    let st = Station::new();
    st.write_config("a", "{}");
    deploy::write_deploy_marker(st.dir.path(), "a").expect("deploy");
    let handle = st.start();

    wait_until("acquisition", || st.driver.is_acquiring()).await;
    st.shutdown.cancel();

    assert_eq!(finish(handle).await, Termination::Shutdown);
    assert_eq!(st.events.reasons(EventKind::RunFinished), vec!["interrupted"]);
    assert!(!st.driver.is_acquiring());
    assert_eq!(st.driver.open_sessions(), 0);
}

#[tokio::test]
async fn device_failure_returns_to_idle() {
    let st = Station::new();
    st.driver.fail(Op::Start);
    st.write_config("a", "{}");
    let handle = st.start();
    sleep(Duration::from_millis(50)).await;
    deploy::write_deploy_marker(st.dir.path(), "a").expect("deploy");

    wait_until("run failure", || st.events.count(EventKind::RunFailed) == 1).await;
    sleep(Duration::from_millis(50)).await;
    assert_eq!(st.events.count(EventKind::RunStarting), 1);
    assert_eq!(st.driver.open_sessions(), 0);

    st.shutdown.cancel();
    assert_eq!(finish(handle).await, Termination::Shutdown);
}

#[tokio::test]
async fn malformed_marker_never_runs() {
    let st = Station::new();
    let handle = st.start();
    sleep(Duration::from_millis(50)).await;
    std::fs::write(
        st.dir.path().join(rakevisor::reconcile::DEPLOY_MARKER),
        "{ nope",
    )
    .expect("write marker");

    wait_until("rejection", || st.events.count(EventKind::MarkerRejected) >= 1).await;
    st.shutdown.cancel();
    assert_eq!(finish(handle).await, Termination::Shutdown);
    assert!(st.driver.journal().is_empty());
}

#[tokio::test]
async fn missing_watch_directory_is_a_startup_error() {
    let st = Station::new();
    let cfg = Config {
        watch_dir: Path::new("/definitely/not/here").to_path_buf(),
        ..st.config()
    };
    let err = timeout(BOUND, st.start_with(cfg))
        .await
        .expect("returns")
        .expect("no panic")
        .expect_err("startup fails");
    assert_eq!(err.as_label(), "runtime_watch_directory");
}
