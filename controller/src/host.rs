use std::{
    io::ErrorKind,
    net::SocketAddr,
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::Serialize;
use tokio::{net::TcpListener, sync::Mutex};
use tracing::{info, warn};

use nightcharge_common::{
    config::{DeviceConfig, ForecastConfig, MqttConfig, TestModeConfig, TriggerConfig},
    ChargerConfig, ChargerStatus, ChargingWindow, ClockSource, CycleSummary, DailyTrigger,
    HeatingCurve, SeasonalFallback, TriggerAction, TOPIC_CMD_CYCLE, TOPIC_CONTROLLER_CYCLE,
    TOPIC_CONTROLLER_STATUS,
};

use crate::{
    clock::{parse_timezone, HostClock},
    cycle::{run_decision_cycle, CycleContext},
    device::ShellyClient,
    notify::{LogNotifier, TelegramNotifier},
    traits::{ActionStore, DeviceClock, ForecastSource, Notifier},
    weather::OpenMeteoClient,
};

const MAX_MQTT_PAYLOAD_BYTES: usize = 64;

#[derive(Clone)]
struct AppState {
    config: Arc<ChargerConfig>,
    services: Services,
    trigger: Arc<Mutex<DailyTrigger>>,
    last_cycle: Arc<Mutex<Option<CycleSummary>>>,
    cycle_lock: Arc<Mutex<()>>,
    cycles_run: Arc<AtomicU64>,
    mqtt: Option<AsyncClient>,
}

#[derive(Clone)]
struct Services {
    forecast: Arc<dyn ForecastSource>,
    store: Arc<dyn ActionStore>,
    clock: Arc<dyn DeviceClock>,
    notifier: Arc<dyn Notifier>,
}

#[derive(Clone)]
struct ConfigStore {
    config_path: Arc<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct NotificationView {
    enabled: bool,
    #[serde(rename = "apiBase")]
    api_base: String,
    #[serde(rename = "botTokenSet")]
    bot_token_set: bool,
    #[serde(rename = "chatIdSet")]
    chat_id_set: bool,
}

#[derive(Debug, Serialize)]
struct MqttView {
    host: String,
    port: u16,
    user: String,
    #[serde(rename = "passSet")]
    pass_set: bool,
    #[serde(rename = "statusIntervalSecs")]
    status_interval_secs: u64,
}

#[derive(Debug, Serialize)]
struct ConfigView {
    device: DeviceConfig,
    window: ChargingWindow,
    forecast: ForecastConfig,
    #[serde(rename = "heatingCurve")]
    heating_curve: HeatingCurve,
    fallback: SeasonalFallback,
    notification: NotificationView,
    trigger: TriggerConfig,
    #[serde(rename = "testMode")]
    test_mode: TestModeConfig,
    mqtt: MqttView,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = ConfigStore::new();
    let mut config = store.load().await.unwrap_or_else(|err| {
        warn!("failed to load charger config from store: {err:#}");
        ChargerConfig::default()
    });
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.sanitize();
    config.validate().context("invalid charger configuration")?;

    let timezone = parse_timezone(&config.trigger.timezone)?;
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.device.request_timeout_secs))
        .build()
        .context("failed to build HTTP client")?;

    let services = Services::build(&config, http, timezone);
    let mqtt = if config.mqtt.host.is_empty() {
        info!("no MQTT broker configured; status publishing disabled");
        None
    } else {
        Some(AsyncClient::new(mqtt_options(&config.mqtt), 64))
    };

    let app_state = AppState {
        trigger: Arc::new(Mutex::new(DailyTrigger::new(config.trigger.fetch_time))),
        config: Arc::new(config),
        services,
        last_cycle: Arc::new(Mutex::new(None)),
        cycle_lock: Arc::new(Mutex::new(())),
        cycles_run: Arc::new(AtomicU64::new(0)),
        mqtt: mqtt.as_ref().map(|(client, _)| client.clone()),
    };

    if let Some((client, eventloop)) = mqtt {
        subscribe_topics(&client).await?;
        spawn_mqtt_loop(app_state.clone(), eventloop);
        spawn_status_publish_loop(app_state.clone());
    }

    if app_state.config.test_mode.enabled {
        spawn_test_mode_loop(app_state.clone());
    } else {
        spawn_trigger_loop(app_state.clone());
    }

    let app = router(app_state);

    let port = std::env::var("CONTROLLER_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;

    info!("controller listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/config", get(handle_get_config))
        .route("/api/cycle", post(handle_post_cycle))
        .with_state(app_state)
}

impl Services {
    fn build(config: &ChargerConfig, http: reqwest::Client, timezone: chrono_tz::Tz) -> Self {
        let device = ShellyClient::new(http.clone(), &config.device.host, timezone);

        let clock: Arc<dyn DeviceClock> = match config.device.clock {
            ClockSource::Host => Arc::new(HostClock::new(timezone)),
            ClockSource::Device => Arc::new(device.clone()),
        };

        let notifier: Arc<dyn Notifier> = if config.notification.enabled {
            Arc::new(TelegramNotifier::new(
                http.clone(),
                &config.notification.api_base,
                &config.notification.bot_token,
                &config.notification.chat_id,
            ))
        } else {
            info!("notifications disabled; reports go to the log only");
            Arc::new(LogNotifier)
        };

        let forecast = OpenMeteoClient::new(
            http,
            &config.forecast.api_base,
            config.forecast.latitude,
            config.forecast.longitude,
            &config.trigger.timezone,
        );

        Self {
            forecast: Arc::new(forecast),
            store: Arc::new(device),
            clock,
            notifier,
        }
    }
}

fn apply_env_overrides(config: &mut ChargerConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(host) = var("SHELLY_HOST") {
        config.device.host = host;
    }
    if let Some(token) = var("TELEGRAM_BOT_TOKEN") {
        config.notification.bot_token = token;
        config.notification.enabled = true;
    }
    if let Some(chat_id) = var("TELEGRAM_CHAT_ID") {
        config.notification.chat_id = chat_id;
    }
    if let Some(host) = var("MQTT_HOST") {
        config.mqtt.host = host;
    }
    if let Some(port) = var("MQTT_PORT").and_then(|value| value.parse::<u16>().ok()) {
        config.mqtt.port = port;
    }
    if let Some(user) = var("MQTT_USER") {
        config.mqtt.user = user;
    }
    if let Some(pass) = var("MQTT_PASS") {
        config.mqtt.pass = pass;
    }
    if let Some(flag) = var("NIGHTCHARGE_TEST_MODE") {
        config.test_mode.enabled = matches!(
            flag.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "on" | "yes"
        );
    }
}

fn mqtt_options(mqtt: &MqttConfig) -> MqttOptions {
    let mut options = MqttOptions::new("nightcharge-controller", mqtt.host.clone(), mqtt.port);
    options.set_keep_alive(Duration::from_secs(30));
    if !mqtt.user.is_empty() {
        options.set_credentials(mqtt.user.clone(), mqtt.pass.clone());
    }
    options
}

async fn subscribe_topics(mqtt: &AsyncClient) -> anyhow::Result<()> {
    mqtt.subscribe(TOPIC_CMD_CYCLE, QoS::AtMostOnce).await?;
    Ok(())
}

/// What a cycle request does when another cycle is still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Overlap {
    /// Operator and test-mode requests are dropped.
    Refuse,
    /// Startup and daily cycles queue behind the running one.
    Wait,
}

/// Runs one decision cycle, or refuses or queues it when another is in flight.
async fn run_cycle(state: &AppState, reason: &str, overlap: Overlap) -> Option<CycleSummary> {
    let summary = {
        let _running = match state.cycle_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) if overlap == Overlap::Wait => {
                warn!("decision cycle already running; {reason} cycle waits for it to finish");
                state.cycle_lock.lock().await
            }
            Err(_) => {
                warn!("decision cycle already running; {reason} request ignored");
                return None;
            }
        };

        info!("starting decision cycle ({reason})");
        let ctx = CycleContext {
            config: &state.config,
            forecast: state.services.forecast.as_ref(),
            store: state.services.store.as_ref(),
            clock: state.services.clock.as_ref(),
            notifier: state.services.notifier.as_ref(),
        };
        let summary = run_decision_cycle(&ctx).await;

        state.cycles_run.fetch_add(1, Ordering::Relaxed);
        *state.last_cycle.lock().await = Some(summary.clone());
        summary
    };

    if summary.outcome.is_aborted() {
        warn!("decision cycle aborted: {:?}", summary.outcome);
    } else {
        info!(
            "decision cycle finished with {} failed switch(es)",
            summary.outcome.failed_switches()
        );
    }

    publish(state, TOPIC_CONTROLLER_CYCLE, &summary).await;
    publish_status(state).await;
    Some(summary)
}

/// Runs the cycle on its own task so the caller's loop keeps ticking.
fn spawn_cycle(app_state: &AppState, reason: &'static str, overlap: Overlap) {
    let state = app_state.clone();
    tokio::spawn(async move {
        run_cycle(&state, reason, overlap).await;
    });
}

fn spawn_trigger_loop(app_state: AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match app_state.services.clock.now().await {
            Ok(now) => {
                let action = app_state.trigger.lock().await.startup(now.time_of_day);
                if action == TriggerAction::RunCycle {
                    info!(
                        "fetch time {} already passed at startup ({})",
                        app_state.config.trigger.fetch_time, now.time_of_day
                    );
                    spawn_cycle(&app_state, "startup", Overlap::Wait);
                }
            }
            Err(err) => warn!("startup clock read failed: {err:#}"),
        }

        let mut interval = tokio::time::interval(Duration::from_secs(
            app_state.config.trigger.tick_interval_secs,
        ));
        loop {
            interval.tick().await;

            let now = match app_state.services.clock.now().await {
                Ok(now) => now,
                Err(err) => {
                    warn!("clock read failed, tick skipped: {err:#}");
                    continue;
                }
            };

            let action = app_state.trigger.lock().await.tick(now.time_of_day);
            match action {
                TriggerAction::RunCycle => {
                    spawn_cycle(&app_state, "daily trigger", Overlap::Wait);
                }
                TriggerAction::Rearmed => {
                    info!(
                        "trigger rearmed for {}",
                        app_state.config.trigger.fetch_time
                    );
                    publish_status(&app_state).await;
                }
                TriggerAction::None => {}
            }
        }
    })
}

fn spawn_test_mode_loop(app_state: AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let secs = app_state.config.test_mode.interval_secs;
        warn!("test mode enabled: running a decision cycle every {secs}s");

        let mut interval = tokio::time::interval(Duration::from_secs(secs));
        loop {
            interval.tick().await;
            spawn_cycle(&app_state, "test mode", Overlap::Refuse);
        }
    })
}

fn spawn_mqtt_loop(app_state: AppState, mut eventloop: rumqttc::EventLoop) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    if let Err(err) =
                        handle_mqtt_message(&app_state, &message.topic, message.payload.to_vec())
                    {
                        warn!("mqtt message handling error: {err:#}");
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

fn spawn_status_publish_loop(app_state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(
            app_state.config.mqtt.status_interval_secs,
        ));
        loop {
            interval.tick().await;
            publish_status(&app_state).await;
        }
    });
}

fn handle_mqtt_message(
    app_state: &AppState,
    topic: &str,
    payload: Vec<u8>,
) -> anyhow::Result<()> {
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        warn!(
            "dropping oversized MQTT payload on topic {} ({} bytes)",
            topic,
            payload.len()
        );
        return Ok(());
    }

    let message = String::from_utf8(payload).context("non utf8 mqtt payload")?;

    match topic {
        TOPIC_CMD_CYCLE if message.trim().eq_ignore_ascii_case("run") => {
            // The event loop has to keep polling while the cycle runs.
            spawn_cycle(app_state, "mqtt command", Overlap::Refuse);
        }
        TOPIC_CMD_CYCLE => warn!("ignoring unknown cycle command '{}'", message.trim()),
        _ => {}
    }
    Ok(())
}

async fn publish_status(state: &AppState) {
    let status = build_status(state).await;
    publish(state, TOPIC_CONTROLLER_STATUS, &status).await;
}

async fn publish<T: Serialize>(state: &AppState, topic: &str, value: &T) {
    let Some(mqtt) = &state.mqtt else {
        return;
    };

    match serde_json::to_vec(value) {
        Ok(body) => {
            if let Err(err) = mqtt.publish(topic, QoS::AtLeastOnce, true, body).await {
                warn!("publish to {topic} failed: {err}");
            }
        }
        Err(err) => warn!("serialization for {topic} failed: {err}"),
    }
}

async fn build_status(state: &AppState) -> ChargerStatus {
    let (trigger_state, has_run_today) = {
        let trigger = state.trigger.lock().await;
        (trigger.state(), trigger.has_run_today())
    };
    let last_cycle = state.last_cycle.lock().await.clone();

    ChargerStatus {
        trigger_state: trigger_state.as_str(),
        has_run_today,
        test_mode: state.config.test_mode.enabled,
        fetch_time: state.config.trigger.fetch_time,
        window: state.config.window,
        switch_ids: state.config.device.switch_ids.clone(),
        timezone: state.config.trigger.timezone.clone(),
        cycle_running: state.cycle_lock.try_lock().is_err(),
        cycles_run: state.cycles_run.load(Ordering::Relaxed),
        last_cycle,
    }
}

fn build_config_view(config: &ChargerConfig) -> ConfigView {
    ConfigView {
        device: config.device.clone(),
        window: config.window,
        forecast: config.forecast.clone(),
        heating_curve: config.heating_curve.clone(),
        fallback: config.fallback.clone(),
        notification: NotificationView {
            enabled: config.notification.enabled,
            api_base: config.notification.api_base.clone(),
            bot_token_set: !config.notification.bot_token.is_empty(),
            chat_id_set: !config.notification.chat_id.is_empty(),
        },
        trigger: config.trigger.clone(),
        test_mode: config.test_mode.clone(),
        mqtt: MqttView {
            host: config.mqtt.host.clone(),
            port: config.mqtt.port,
            user: config.mqtt.user.clone(),
            pass_set: !config.mqtt.pass.is_empty(),
            status_interval_secs: config.mqtt.status_interval_secs,
        },
    }
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(build_status(&state).await)
}

async fn handle_get_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(build_config_view(&state.config))
}

async fn handle_post_cycle(State(state): State<AppState>) -> impl IntoResponse {
    match run_cycle(&state, "api request", Overlap::Refuse).await {
        Some(summary) => Json(summary).into_response(),
        None => error_response(StatusCode::CONFLICT, "A decision cycle is already running"),
    }
}

impl ConfigStore {
    fn new() -> Self {
        let data_dir = std::env::var("NIGHTCHARGE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.nightcharge"));
        Self::at(data_dir)
    }

    fn at(data_dir: PathBuf) -> Self {
        Self {
            config_path: Arc::new(data_dir.join("config.json")),
        }
    }

    async fn load(&self) -> anyhow::Result<ChargerConfig> {
        match tokio::fs::read(self.config_path.as_ref()).await {
            Ok(raw) => serde_json::from_slice::<ChargerConfig>(&raw)
                .with_context(|| format!("invalid JSON in {}", self.config_path.display())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(ChargerConfig::default()),
            Err(err) => Err(err.into()),
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}
