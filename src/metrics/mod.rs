use lazy_static::lazy_static;
use prometheus::IntCounter;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;

lazy_static! {
    pub static ref SERVICE_WATCHERS_CREATED: IntCounter = IntCounter::with_opts(Opts::new(
        "sd_service_watchers_created_total",
        "Total number of per-service long-poll watchers started"
    ))
    .expect("metric can not be created");

    pub static ref SERVICE_WATCHERS_STOPPED: IntCounter = IntCounter::with_opts(Opts::new(
        "sd_service_watchers_stopped_total",
        "Total number of per-service long-poll watchers stopped"
    ))
    .expect("metric can not be created");

    pub static ref SERVICE_WATCHERS_ACTIVE: IntGauge = IntGauge::with_opts(Opts::new(
        "sd_service_watchers",
        "Number of currently running per-service long-poll watchers"
    ))
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

pub fn register_custom_metrics() {
    REGISTRY
        .register(Box::new(SERVICE_WATCHERS_CREATED.clone()))
        .expect("collector can be registered");
    REGISTRY
        .register(Box::new(SERVICE_WATCHERS_STOPPED.clone()))
        .expect("collector can be registered");
    REGISTRY
        .register(Box::new(SERVICE_WATCHERS_ACTIVE.clone()))
        .expect("collector can be registered");
}
