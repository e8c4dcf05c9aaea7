use {
    std::{
        panic::{self, PanicHookInfo},
        sync::Once,
        thread,
    },
    time::macros::format_description,
    tracing::level_filters::LevelFilter,
    tracing_subscriber::fmt::{time::UtcTime, writer::MakeWriterExt as _},
};

/// Initializes the tracing setup that is shared between the binaries.
/// `env_filter` has similar syntax to env_logger. It is documented at
/// https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html
pub fn initialize(env_filter: &str, stderr_threshold: LevelFilter) {
    set_tracing_subscriber(env_filter, stderr_threshold);
    set_panic_hook();
}

/// Like [`initialize`], but can be called multiple times in a row. Later calls
/// are ignored.
///
/// Useful for tests.
pub fn initialize_reentrant(env_filter: &str) {
    // The tracing subscriber is a global object so initializing it again in
    // the same process by a different thread would fail.
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        set_tracing_subscriber(env_filter, LevelFilter::ERROR);
        set_panic_hook();
    });
}

fn set_tracing_subscriber(env_filter: &str, stderr_threshold: LevelFilter) {
    let subscriber_builder = tracing_subscriber::fmt::fmt()
        .with_timer(UtcTime::new(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
        )))
        .with_env_filter(env_filter)
        .with_ansi(atty::is(atty::Stream::Stdout));
    match stderr_threshold.into_level() {
        Some(threshold) => subscriber_builder
            .with_writer(
                std::io::stderr
                    .with_max_level(threshold)
                    .or_else(std::io::stdout),
            )
            .init(),
        None => subscriber_builder.init(),
    };
}

// Sets a panic hook so panic information is logged in addition to the default
// panic printer.
fn set_panic_hook() {
    let default_hook = panic::take_hook();
    let hook = move |info: &PanicHookInfo| {
        let thread = thread::current();
        let thread_name = thread.name().unwrap_or("<unnamed>");
        // It is not possible for our custom hook to print a full backtrace on
        // stable rust. To not lose this information we call the default panic
        // handler which prints the full backtrace.
        tracing::error!("thread '{}' {}:", thread_name, info);
        default_hook(info);
    };
    panic::set_hook(Box::new(hook));
}
