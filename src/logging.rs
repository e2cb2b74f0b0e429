use colored::{Color, Colorize};
use log::LevelFilter;

const LOG_LEVEL_ENV: &str = "HOPS_LOG";

/// Route `log` records to stderr with coloured level labels.
///
/// The level defaults to `info` and can be overridden with `HOPS_LOG`.
pub fn init_logging() -> Result<(), fern::InitError> {
    let level = level_from_env(std::env::var(LOG_LEVEL_ENV).ok().as_deref());

    fern::Dispatch::new()
        .format(|out, message, record| {
            let label = record.level().to_string().to_lowercase();
            out.finish(format_args!(
                "{} {}",
                label.color(level_color(record.level())).bold(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}

fn level_from_env(value: Option<&str>) -> LevelFilter {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info)
}

fn level_color(level: log::Level) -> Color {
    match level {
        log::Level::Error => Color::Red,
        log::Level::Warn => Color::Yellow,
        log::Level::Info => Color::Green,
        log::Level::Debug => Color::Blue,
        log::Level::Trace => Color::Magenta,
    }
}
