/*****************************************************************************************[probe.rs]
Copyright (c) 2018-2018, Masaki Hara

Permission is hereby granted, free of charge, to any person obtaining a copy of this software and
associated documentation files (the "Software"), to deal in the Software without restriction,
including without limitation the rights to use, copy, modify, merge, publish, distribute,
sublicense, and/or sell copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all copies or
substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT
NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT
OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.
**************************************************************************************************/

//! Failed-literal probing over backdoor variables.

use {
    crate::{
        clause::{Lit, Var},
        error::{Error, Result},
        interface::{Propagate, SolveLimited, SolveResult},
    },
    std::collections::BTreeSet,
};

/// Units derived by probing, kept sorted by variable.
///
/// A unit is never retracted once derived.
#[derive(Clone, Debug, Default)]
pub struct DerivedUnits {
    units: BTreeSet<Lit>,
}

impl DerivedUnits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn contains(&self, lit: Lit) -> bool {
        self.units.contains(&lit)
    }

    /// Units in variable order.
    pub fn iter(&self) -> impl Iterator<Item = Lit> + '_ {
        self.units.iter().copied()
    }

    /// Add `lit`. Returns `true` if it is new.
    ///
    /// Fails if `!lit` was derived before.
    pub fn insert(&mut self, lit: Lit) -> Result<bool> {
        if self.units.contains(&!lit) {
            return Err(Error::inconsistency(format!(
                "derived both {} and {}",
                lit, !lit
            )));
        }
        Ok(self.units.insert(lit))
    }

    /// Add all of `lits`, returning the ones that were new.
    pub fn extend(&mut self, lits: &[Lit]) -> Result<Vec<Lit>> {
        let mut new = vec![];
        for &lit in lits {
            if self.insert(lit)? {
                new.push(lit);
            }
        }
        Ok(new)
    }
}

fn probe_literals(backdoor: &[Var]) -> impl Iterator<Item = Lit> + '_ {
    backdoor
        .iter()
        .flat_map(|&v| vec![Lit::new(v, false), Lit::new(v, true)])
}

/// Probe both polarities of each variable of `backdoor` with unit propagation.
///
/// If assuming `l` leads to a conflict, `!l` is a derived unit. When
/// `add_units` is set, each derived unit is asserted into `oracle` as soon as
/// it is found, which strengthens the remaining probes.
pub fn probe<P>(oracle: &mut P, backdoor: &[Var], add_units: bool) -> Result<Vec<Lit>>
where
    P: Propagate + ?Sized,
{
    let mut units = DerivedUnits::new();
    for lit in probe_literals(backdoor) {
        if oracle.propagate(&[lit]) {
            trace!("failed literal {}", lit);
            if units.insert(!lit)? && add_units && !oracle.add_clause(&[!lit]) {
                return Err(Error::Refuted);
            }
        }
    }
    Ok(units.iter().collect())
}

/// Probe both polarities of each variable of `backdoor` with a budgeted search.
///
/// UNSAT derives a unit, UNKNOWN derives nothing, and SAT contradicts the
/// unsatisfiability of the formula.
pub fn probe_limited<S>(oracle: &mut S, backdoor: &[Var], conflict_budget: u64) -> Result<Vec<Lit>>
where
    S: SolveLimited + ?Sized,
{
    let mut units = DerivedUnits::new();
    for lit in probe_literals(backdoor) {
        match oracle.solve_limited(&[lit], conflict_budget)? {
            SolveResult::Unsat => {
                units.insert(!lit)?;
            }
            SolveResult::Unknown => (),
            SolveResult::Sat => {
                return Err(Error::inconsistency(format!(
                    "probing {} found a model",
                    lit
                )))
            }
        }
    }
    Ok(units.iter().collect())
}
