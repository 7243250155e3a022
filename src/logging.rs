// ==========================================
// Inicialización de logs
// ==========================================
// tracing + tracing-subscriber, nivel configurable por RUST_LOG
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// Instala el subscriber de la CLI.
///
/// `RUST_LOG` controla el filtro (por defecto `info`), por ejemplo
/// `RUST_LOG=inventario_tools=debug`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Subscriber para tests: nivel debug, salida capturada por el harness.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
