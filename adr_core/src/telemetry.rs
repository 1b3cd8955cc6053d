//! Per-cycle telemetry snapshot.

/// Readings sampled during one control cycle. Produced fresh each cycle and
/// retained only as the "most recent" snapshot for observers; rates are
/// computed from the controller's own previous-cycle history, never from
/// this struct.
#[derive(Debug, Clone, Copy)]
pub struct Telemetry {
    /// Back-EMF across the magnet (V).
    pub back_emf_v: f64,
    /// Supply output current (A).
    pub supply_current_a: f64,
    /// Supply output voltage (V).
    pub supply_voltage_v: f64,
    /// Feedback stage temperature (K), if a fresh or cached reading exists.
    pub stage_temp_k: Option<f64>,
    /// Seconds since the active run started.
    pub elapsed_s: f64,
}
