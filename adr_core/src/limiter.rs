//! The safety limiter: an ordered chain of hard clamps on a proposed voltage
//! delta.
//!
//! The precedence below is load-bearing: later clamps may further restrict an
//! earlier result but never relax it. Both control loops run the full chain
//! every cycle, even when some clamps are no-ops by construction of their
//! proposal.
//!
//! 1. current ceiling: over-current kills any positive delta
//! 2. voltage ceiling: the commanded voltage never exceeds the supply limit
//! 3. back-EMF steady-state band: keep the coil EMF inside
//!    `[-magnet_voltage_v, +magnet_voltage_v]` except when correcting an
//!    out-of-band condition; a clamp that flips the delta's sign re-zeros it
//! 4. voltage slew ceiling: rescale, preserving sign
//! 5. current slew abort: zero the delta outright for this cycle
//! 6. non-negative floor: voltage is never commanded negative; hitting the
//!    floor is signalled to the caller

use crate::config::Limits;
use crate::util::DT_EPS_S;

/// Cycle measurements the clamps key off.
#[derive(Debug, Clone, Copy)]
pub struct LimiterCtx {
    /// Present supply voltage (V).
    pub supply_voltage_v: f64,
    /// Present supply current (A).
    pub supply_current_a: f64,
    /// Present back-EMF across the magnet (V).
    pub back_emf_v: f64,
    /// Current change since the previous cycle (A).
    pub di_a: f64,
    /// Elapsed time since the previous cycle (s). Values at or below
    /// `DT_EPS_S` disable the rate clamps for this cycle.
    pub dt_s: f64,
}

/// Result of the clamp chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clamped {
    /// The clamped voltage delta (V).
    pub dv: f64,
    /// The non-negative floor fired: the final voltage must be exactly 0 and
    /// the calling controller decides whether that terminates its run.
    pub floored: bool,
}

/// Run the six-clamp chain over a proposed voltage delta.
///
/// `didt_limit_a_per_s` is the mode-specific current slew ceiling (mag-up and
/// regulate carry different ones).
pub fn clamp_delta(
    proposed_dv: f64,
    ctx: &LimiterCtx,
    limits: &Limits,
    didt_limit_a_per_s: f64,
) -> Clamped {
    let mut dv = proposed_dv;

    // 1. Hard current ceiling: never push current further up when already over.
    if ctx.supply_current_a > limits.current_a && dv > 0.0 {
        dv = 0.0;
    }

    // 2. Hard voltage ceiling.
    if ctx.supply_voltage_v + dv > limits.voltage_v {
        dv = limits.voltage_v - ctx.supply_voltage_v;
    }

    // 3. Back-EMF steady-state band. A lowering delta may not drive the EMF
    //    below -limit, a raising delta may not drive it above +limit; if the
    //    band correction flips the sign, hold instead.
    if dv < 0.0 {
        dv = dv.max(ctx.back_emf_v - limits.magnet_voltage_v);
        if dv > 0.0 {
            dv = 0.0;
        }
    } else if dv > 0.0 {
        dv = dv.min(limits.magnet_voltage_v - ctx.back_emf_v);
        if dv < 0.0 {
            dv = 0.0;
        }
    }

    // 4 + 5. Rate clamps; skipped on same-cycle re-entry (dt ~ 0), where the
    //    finite differences carry no information.
    if ctx.dt_s > DT_EPS_S {
        if (dv / ctx.dt_s).abs() > limits.dvdt_v_per_s {
            dv = limits.dvdt_v_per_s * ctx.dt_s * dv.signum();
        }
        if (ctx.di_a / ctx.dt_s).abs() > didt_limit_a_per_s {
            // Safety abort for this cycle, not a partial clamp.
            dv = 0.0;
        }
    }

    // 6. Non-negative floor.
    let mut floored = false;
    if ctx.supply_voltage_v + dv <= 0.0 {
        dv = -ctx.supply_voltage_v;
        floored = true;
    }

    Clamped { dv, floored }
}
