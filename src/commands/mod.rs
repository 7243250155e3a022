pub mod import_ops;
pub mod migration_ops;
pub mod reference_ops;

/// Código de salida para invocación inválida o fallo de corrida completa
pub const EXIT_FATAL: i32 = 2;
