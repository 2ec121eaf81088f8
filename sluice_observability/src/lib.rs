//! Logging and metrics setup shared by the sluice binaries.
//!
//! Logs go to stdout through `tracing-subscriber`. Metrics are recorded through the
//! global OpenTelemetry meter provider and only exported when the OTel SDK is
//! explicitly enabled with `OTEL_SDK_DISABLED=false`.

use std::borrow::Cow;
use std::time::Duration;

use opentelemetry::global;
use opentelemetry_otlp::{ExporterBuildError, MetricExporter};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::error::OTelSdkError;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use snafu::{ResultExt, Snafu};
use tracing::Subscriber;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer};
use tracing_subscriber::{prelude::*, registry::LookupSpan};

pub use opentelemetry::KeyValue;
pub use opentelemetry::metrics::{Counter, Meter, UpDownCounter};

const OTEL_SDK_DISABLED: &str = "OTEL_SDK_DISABLED";
const METRICS_EXPORT_INTERVAL: Duration = Duration::from_secs(10);

pub type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

#[derive(Debug, Snafu)]
pub enum ObservabilityError {
    #[snafu(display("Failed to build metrics exporter"))]
    Exporter { source: ExporterBuildError },
    #[snafu(display("Failed to install the tracing subscriber"))]
    Subscriber { source: TryInitError },
    #[snafu(display("Failed to shut down the meter provider"))]
    Shutdown { source: OTelSdkError },
}

/// Keeps the meter provider alive. Call [`ObservabilityGuard::shutdown`] before exiting to
/// flush pending metrics.
#[derive(Debug)]
pub struct ObservabilityGuard {
    meter_provider: SdkMeterProvider,
}

pub fn meter(name: &'static str) -> Meter {
    global::meter(name)
}

pub fn init_observability(
    package_name: impl Into<Cow<'static, str>>,
    package_version: impl Into<Cow<'static, str>>,
) -> Result<ObservabilityGuard, ObservabilityError> {
    // The otel sdk doesn't follow the disabled env variable flag,
    // and we default to disabled.
    let sdk_disabled = std::env::var(OTEL_SDK_DISABLED)
        .map(|v| v == "true")
        .unwrap_or(true);

    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }

    let meter_provider = meter_provider(package_name, package_version, !sdk_disabled)?;
    global::set_meter_provider(meter_provider.clone());

    tracing_subscriber::registry()
        .with(vec![stdout()])
        .try_init()
        .context(SubscriberSnafu {})?;

    Ok(ObservabilityGuard { meter_provider })
}

impl ObservabilityGuard {
    pub fn shutdown(self) -> Result<(), ObservabilityError> {
        self.meter_provider.shutdown().context(ShutdownSnafu {})
    }
}

fn stdout<S>() -> BoxedLayer<S>
where
    S: Subscriber,
    for<'a> S: LookupSpan<'a>,
{
    let log_env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("INFO"));

    let json_fmt = std::env::var("RUST_LOG_FORMAT")
        .map(|val| val == "json")
        .unwrap_or(false);

    if json_fmt {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .json()
            .with_filter(log_env_filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(false)
            .compact()
            .with_filter(log_env_filter)
            .boxed()
    }
}

fn meter_provider(
    package_name: impl Into<Cow<'static, str>>,
    version: impl Into<Cow<'static, str>>,
    sdk_enabled: bool,
) -> Result<SdkMeterProvider, ObservabilityError> {
    let resource = Resource::builder()
        .with_service_name(package_name.into().into_owned())
        .with_attribute(KeyValue::new("service.version", version.into().into_owned()))
        .build();

    let mut builder = SdkMeterProvider::builder().with_resource(resource);

    if sdk_enabled {
        let exporter = MetricExporter::builder()
            .with_tonic()
            .build()
            .context(ExporterSnafu {})?;

        let reader = PeriodicReader::builder(exporter)
            .with_interval(METRICS_EXPORT_INTERVAL)
            .build();

        builder = builder.with_reader(reader);
    }

    Ok(builder.build())
}
