//! `From` implementations bridging `adr_config` schema types to `adr_core`
//! runtime types, so the CLI never maps fields by hand.

use crate::config::{FaultSentinels, Limits, RegulateGains, Timeouts};

impl From<&adr_config::LimitsCfg> for Limits {
    fn from(c: &adr_config::LimitsCfg) -> Self {
        Self {
            current_a: c.current_a,
            voltage_v: c.voltage_v,
            magnet_voltage_v: c.magnet_voltage_v,
            mag_up_step_v: c.mag_up_step_v,
            didt_mag_up_a_per_s: c.didt_mag_up_a_per_s,
            didt_regulate_a_per_s: c.didt_regulate_a_per_s,
            dvdt_v_per_s: c.dvdt_v_per_s,
        }
    }
}

impl From<&adr_config::RegulateCfg> for RegulateGains {
    fn from(c: &adr_config::RegulateCfg) -> Self {
        Self {
            kp: c.kp,
            kd: c.kd,
            feedback_channel: c.feedback_channel.into(),
            settle_factor: c.settle_factor,
            max_target_k: c.max_target_k,
        }
    }
}

impl From<&adr_config::Timeouts> for Timeouts {
    fn from(c: &adr_config::Timeouts) -> Self {
        Self { io_ms: c.io_ms }
    }
}

impl From<&adr_config::FaultSentinels> for FaultSentinels {
    fn from(c: &adr_config::FaultSentinels) -> Self {
        Self {
            ggg_k: c.ggg_k,
            faa_k: c.faa_k,
        }
    }
}
