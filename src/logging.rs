use log::info;

/// Installs the env_logger backend, defaulting to `info`.
///
/// Safe to call more than once; later calls leave the first logger in place.
pub fn initialize_logger() {
    let initialized = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .format_module_path(true)
        .try_init()
        .is_ok();

    if initialized {
        info!("Logger initialized");
    }
}
