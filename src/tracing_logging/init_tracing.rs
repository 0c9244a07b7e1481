use tracing::dispatcher;
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use super::{TracingConfig, TracingScope, WriterConfig};

/// Boxed layer, type-erased so stdout/file layers can be pushed into one
/// homogeneous `Vec` regardless of their concrete writer type.
pub type DynLayer<S> = dyn Layer<S> + Send + Sync + 'static;

macro_rules! create_fmt {
    () => {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_thread_names(true)
            .with_target(false)
    };
}

/// Installs the layers built from `tracing_config`, either as the process
/// global subscriber or scoped to the calling thread.
pub fn init_tracing(tracing_config: TracingConfig) -> crate::common::CmResult<Option<dispatcher::DefaultGuard>> {
    let scope = tracing_config.scope;
    let layers = try_create_layers(tracing_config)?;
    Ok(match scope {
        TracingScope::Global => {
            tracing_subscriber::registry().with(layers).init();
            None
        }
        TracingScope::ThreadLocal => Some(tracing_subscriber::registry().with(layers).set_default()),
    })
}

/// Builds the layer stack without installing it.
pub fn try_create_layers(
    tracing_config: TracingConfig,
) -> crate::common::CmResult<Vec<Box<DynLayer<tracing_subscriber::Registry>>>> {
    let mut layers: Vec<Box<DynLayer<tracing_subscriber::Registry>>> = vec![Box::new(tracing_config.get_level_filter())];

    if let Some(layer) = create_display_layer(tracing_config.get_writer_config())? {
        layers.push(layer);
    }
    if let Some(layer) = create_file_layer(tracing_config.get_writer_config())? {
        layers.push(layer);
    }

    Ok(layers)
}

fn create_display_layer<S>(writer_config: WriterConfig) -> crate::common::CmResult<Option<Box<DynLayer<S>>>>
where
    S: tracing_core::Subscriber,
    for<'a> S: LookupSpan<'a>,
{
    let fmt_layer = create_fmt!();
    Ok(match writer_config {
        WriterConfig::Stdout | WriterConfig::StdoutAndFile(_) => {
            Some(Box::new(fmt_layer.with_writer(std::io::stdout)) as Box<DynLayer<S>>)
        }
        WriterConfig::Stderr => Some(Box::new(fmt_layer.with_writer(std::io::stderr)) as Box<DynLayer<S>>),
        WriterConfig::File(_) => None,
    })
}

fn create_file_layer<S>(writer_config: WriterConfig) -> crate::common::CmResult<Option<Box<DynLayer<S>>>>
where
    S: tracing_core::Subscriber,
    for<'a> S: LookupSpan<'a>,
{
    let path = match writer_config {
        WriterConfig::File(path) | WriterConfig::StdoutAndFile(path) => path,
        _ => return Ok(None),
    };

    let path = std::path::Path::new(&path);
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
    let prefix = path.file_name().and_then(|n| n.to_str()).unwrap_or("sysutil");

    let writer = rolling::never(dir, prefix);
    let fmt_layer = create_fmt!().with_writer(writer).with_ansi(false);
    Ok(Some(Box::new(fmt_layer) as Box<DynLayer<S>>))
}
