use std::panic;

/// Pretty backtraces plus a log record of the panic.
///
/// Worker units catch renderer panics themselves; this hook only sees panics
/// that escape to the process (and the ones units catch, which are still
/// logged here before being turned into errors).
pub fn initialize_panic_handler() {
    better_panic::install();

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let thread = std::thread::current();
        log::error!(
            "Panic in thread {}: {panic_info}",
            thread.name().unwrap_or("<unnamed>")
        );

        default_hook(panic_info);
    }));
}
