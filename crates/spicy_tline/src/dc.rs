use serde::Serialize;

use crate::circuit::{Circuit, IBR1, IBR2, PORT1, PORT2, SOURCE, VSRC};
use crate::engine::TimeContext;
use crate::error::TlineError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperatingPointResult {
    pub voltages: Vec<(String, f64)>,
    pub currents: Vec<(String, f64)>,
}

impl OperatingPointResult {
    pub fn voltage(&self, name: &str) -> Option<f64> {
        self.voltages.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn current(&self, name: &str) -> Option<f64> {
        self.currents.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }
}

/// Solve and accept the operating point. Returns the raw solution vector.
pub(crate) fn simulate_op_inner(circuit: &mut Circuit) -> Result<Vec<f64>, TlineError> {
    let ctx = TimeContext::dc();
    let x = circuit.solve(&ctx)?;
    circuit.accept(&x, &ctx, &mut Vec::new())?;
    Ok(x)
}

pub fn simulate_op(circuit: &mut Circuit) -> Result<OperatingPointResult, TlineError> {
    let x = simulate_op_inner(circuit)?;
    let named = |names: &[(&str, usize)]| {
        names
            .iter()
            .map(|&(name, idx)| (name.to_string(), x[idx]))
            .collect::<Vec<_>>()
    };
    let result = OperatingPointResult {
        voltages: named(&[("in", SOURCE), ("p1", PORT1), ("p2", PORT2)]),
        currents: named(&[("vs", VSRC), ("t1.1", IBR1), ("t1.2", IBR2)]),
    };
    log::debug!("operating point: {:?}", result.voltages);
    Ok(result)
}
