//! Logging setup shared by the server and client binaries.
//!
//! Installs `env_logger` behind the `log` facade with a format that carries
//! the call site (file basename and line) alongside the level, so records
//! from the engine thread and the receiver thread can be told apart by
//! origin. `RUST_LOG` overrides the default filter as usual.

use std::io::Write;

use env_logger::{Builder, Env};
use log::LevelFilter;

/// Initializes process-wide logging with the given default level.
///
/// Safe to call more than once; only the first call installs the logger.
pub fn init(default_level: LevelFilter) {
    let env = Env::default().default_filter_or(default_level.to_string());

    let _ = Builder::from_env(env)
        .format(|buf, record| {
            let file = record
                .file()
                .map(|path| path.rsplit(['/', '\\']).next().unwrap_or(path))
                .unwrap_or("?");
            writeln!(
                buf,
                "[{:<5} {}:{}] {}",
                record.level(),
                file,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        init(LevelFilter::Debug);
        init(LevelFilter::Info);
        log::info!("logger initialized");
    }
}
