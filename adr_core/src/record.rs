//! Tab-separated temperature record.
//!
//! One line per monitor pass: elapsed seconds, the two diode stages, then
//! the bridge stages the channel policy records. Trailing absent columns are
//! dropped so a FAA-only run produces four columns, not five; an absent
//! value that has later columns after it is written as `nan` to keep the
//! columns aligned.

use std::io::Write;

use crate::monitor::StageTemps;

pub struct TempRecord<W: Write> {
    out: W,
}

impl<W: Write> TempRecord<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn append(&mut self, temps: &StageTemps) -> std::io::Result<()> {
        let mut cols: Vec<Option<f64>> = vec![
            Some(temps.elapsed_s),
            temps.stage_60k,
            temps.stage_3k,
            temps.ggg_k,
            temps.faa_k,
        ];
        while cols.len() > 3 && cols.last() == Some(&None) {
            cols.pop();
        }
        let line = cols
            .iter()
            .map(|c| match c {
                Some(v) => format!("{v}"),
                None => "nan".to_string(),
            })
            .collect::<Vec<_>>()
            .join("\t");
        writeln!(self.out, "{line}")?;
        self.out.flush()
    }
}
