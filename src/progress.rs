use std::io::{self, Write};
use std::time::Instant;

use tracing::info;

/// Progreso de una importación por streaming: filas aceptadas y rechazadas
pub struct ProgressTracker {
    start_time: Instant,
    appended: u64,
    rejected: u64,
    report_interval: u64,
}

impl ProgressTracker {
    pub fn new(report_interval: u64) -> Self {
        Self {
            start_time: Instant::now(),
            appended: 0,
            rejected: 0,
            report_interval: report_interval.max(1),
        }
    }

    pub fn row_appended(&mut self) {
        self.appended += 1;
        self.maybe_report();
    }

    pub fn row_rejected(&mut self) {
        self.rejected += 1;
        self.maybe_report();
    }

    fn maybe_report(&self) {
        if self.processed() % self.report_interval == 0 {
            self.report();
        }
    }

    fn report(&self) {
        print!(
            "\r📊 Procesadas: {} | Aceptadas: {} | Rechazadas: {} | {:.0} filas/s",
            self.processed(),
            self.appended,
            self.rejected,
            self.rate()
        );
        io::stdout().flush().ok();
    }

    /// Cierra la línea de progreso e imprime el resumen
    pub fn finish(&self) {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        println!(
            "\n✅ Completado: {} aceptadas, {} rechazadas en {:.1}s ({:.0} filas/s)",
            self.appended,
            self.rejected,
            elapsed,
            self.rate()
        );
        info!(
            appended = self.appended,
            rejected = self.rejected,
            elapsed_secs = elapsed,
            "importación procesada"
        );
    }

    pub fn processed(&self) -> u64 {
        self.appended + self.rejected
    }

    pub fn appended(&self) -> u64 {
        self.appended
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    fn rate(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.processed() as f64 / elapsed
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_accepted_and_rejected_rows() {
        let mut tracker = ProgressTracker::new(0);
        tracker.row_appended();
        tracker.row_appended();
        tracker.row_rejected();

        assert_eq!(tracker.appended(), 2);
        assert_eq!(tracker.rejected(), 1);
        assert_eq!(tracker.processed(), 3);
    }
}
