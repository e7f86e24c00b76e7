/*****************************************************************************************[propagate.rs]
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

//! Reference propagation oracle.
//!
//! Two-watched-literal unit propagation over a clause database, with a
//! level-0 trail for permanently added units. It never branches: it only
//! answers whether a set of assumptions propagates to a conflict.

use crate::{
    clause::Lit,
    dimacs::Cnf,
    interface::Propagate,
};

const UNDEF: i8 = 0;
const TRUE: i8 = 1;
const FALSE: i8 = -1;

#[inline(always)]
fn lit_index(lit: Lit) -> usize {
    2 * lit.var().idx() as usize + (!lit.sign()) as usize
}

#[inline(always)]
fn value_lit(assigns: &[i8], lit: Lit) -> i8 {
    let v = assigns[lit.var().idx() as usize];
    if lit.sign() {
        v
    } else {
        -v
    }
}

/// Unit propagation engine.
#[derive(Debug, Default)]
pub struct UnitPropagator {
    clauses: Vec<Vec<Lit>>,
    /// `watches[l]` holds the clauses to visit when `l` becomes false.
    watches: Vec<Vec<usize>>,
    assigns: Vec<i8>,
    trail: Vec<Lit>,
    qhead: usize,
    /// Length of the level-0 part of the trail.
    root: usize,
    ok: bool,
    num_propagations: u64,
}

impl UnitPropagator {
    pub fn new() -> Self {
        UnitPropagator {
            ok: true,
            ..Default::default()
        }
    }

    pub fn from_cnf(cnf: &Cnf) -> Self {
        let mut p = UnitPropagator::new();
        p.ensure_var(cnf.num_vars());
        for c in cnf.clauses() {
            if !p.add_clause(c.lits()) {
                break;
            }
        }
        p
    }

    /// `false` once the clause database is inconsistent at level 0.
    pub fn is_ok(&self) -> bool {
        self.ok
    }

    pub fn num_vars(&self) -> u32 {
        self.assigns.len() as u32
    }

    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    pub fn num_propagations(&self) -> u64 {
        self.num_propagations
    }

    /// Literals fixed at level 0.
    pub fn proved_at_lvl_0(&self) -> &[Lit] {
        &self.trail[..self.root]
    }

    fn ensure_var(&mut self, n: u32) {
        let n = n as usize;
        if self.assigns.len() < n {
            self.assigns.resize(n, UNDEF);
            self.watches.resize(2 * n, vec![]);
        }
    }

    fn value(&self, lit: Lit) -> i8 {
        value_lit(&self.assigns, lit)
    }

    fn enqueue(&mut self, lit: Lit) {
        debug_assert_eq!(self.value(lit), UNDEF);
        self.assigns[lit.var().idx() as usize] = if lit.sign() { TRUE } else { FALSE };
        self.trail.push(lit);
    }

    fn backtrack_to(&mut self, len: usize) {
        for &lit in &self.trail[len..] {
            self.assigns[lit.var().idx() as usize] = UNDEF;
        }
        self.trail.truncate(len);
        self.qhead = len;
    }

    /// Propagate all enqueued facts. Returns `true` on conflict.
    fn bcp(&mut self) -> bool {
        while self.qhead < self.trail.len() {
            let p = self.trail[self.qhead];
            self.qhead += 1;
            self.num_propagations += 1;
            let false_lit = !p;
            let mut ws = std::mem::take(&mut self.watches[lit_index(false_lit)]);
            let mut i = 0;
            let mut conflict = false;

            'clauses: while i < ws.len() {
                let cr = ws[i];
                let c = &mut self.clauses[cr];
                // Make sure the false literal is c[1]:
                if c[0] == false_lit {
                    c.swap(0, 1);
                }
                debug_assert_eq!(c[1], false_lit);

                // If 0th watch is true, then clause is already satisfied.
                let first = c[0];
                if value_lit(&self.assigns, first) == TRUE {
                    i += 1;
                    continue;
                }

                // Look for new watch:
                for k in 2..c.len() {
                    if value_lit(&self.assigns, c[k]) != FALSE {
                        c.swap(1, k);
                        let new_watch = c[1];
                        self.watches[lit_index(new_watch)].push(cr);
                        ws.swap_remove(i);
                        continue 'clauses;
                    }
                }

                // Did not find watch -- clause is unit under assignment:
                i += 1;
                if value_lit(&self.assigns, first) == FALSE {
                    conflict = true;
                    break;
                } else {
                    self.enqueue(first);
                }
            }

            self.watches[lit_index(false_lit)] = ws;
            if conflict {
                self.qhead = self.trail.len();
                return true;
            }
        }
        false
    }
}

impl Propagate for UnitPropagator {
    fn propagate(&mut self, assumps: &[Lit]) -> bool {
        if !self.ok {
            return true;
        }
        debug_assert_eq!(self.trail.len(), self.root);
        let mut conflict = false;
        for &lit in assumps {
            self.ensure_var(lit.var().id());
            match self.value(lit) {
                TRUE => continue,
                FALSE => {
                    conflict = true;
                    break;
                }
                _ => {
                    self.enqueue(lit);
                    if self.bcp() {
                        conflict = true;
                        break;
                    }
                }
            }
        }
        let root = self.root;
        self.backtrack_to(root);
        conflict
    }

    fn add_clause(&mut self, clause: &[Lit]) -> bool {
        if !self.ok {
            return false;
        }
        if let Some(max) = clause.iter().map(|l| l.var().id()).max() {
            self.ensure_var(max);
        }
        // simplify under the level-0 assignment
        let mut lits: Vec<Lit> = Vec::with_capacity(clause.len());
        for &lit in clause {
            match self.value(lit) {
                TRUE => return true,
                FALSE => continue,
                _ => {
                    if lits.contains(&!lit) {
                        return true; // tautology
                    }
                    if !lits.contains(&lit) {
                        lits.push(lit);
                    }
                }
            }
        }

        match lits.len() {
            0 => {
                self.ok = false;
            }
            1 => {
                self.enqueue(lits[0]);
                if self.bcp() {
                    self.ok = false;
                }
                self.root = self.trail.len();
            }
            _ => {
                let cr = self.clauses.len();
                self.watches[lit_index(lits[0])].push(cr);
                self.watches[lit_index(lits[1])].push(cr);
                self.clauses.push(lits);
            }
        }
        self.ok
    }
}

/// Make a propagator over variables `1..=n` from signed DIMACS clauses.
pub fn from_dimacs_clauses(n: u32, clauses: &[&[i32]]) -> UnitPropagator {
    let mut p = UnitPropagator::new();
    p.ensure_var(n);
    for c in clauses {
        let lits: Vec<Lit> = c.iter().filter_map(|&i| Lit::from_dimacs(i)).collect();
        p.add_clause(&lits);
    }
    p
}

#[cfg(test)]
mod test {
    use super::*;

    fn lits(ints: &[i32]) -> Vec<Lit> {
        ints.iter().map(|&i| Lit::from_dimacs(i).unwrap()).collect()
    }

    #[test]
    fn test_chain() {
        // 1 -> 2 -> 3, and not (3 and 4)
        let mut p = from_dimacs_clauses(4, &[&[-1, 2], &[-2, 3], &[-3, -4]]);
        assert!(!p.propagate(&lits(&[1])));
        assert!(p.propagate(&lits(&[1, 4])));
        assert!(p.propagate(&lits(&[4, 1])));
        assert!(!p.propagate(&lits(&[-1, 4])));
        // state restored after a conflict
        assert!(!p.propagate(&lits(&[2])));
        assert!(p.proved_at_lvl_0().is_empty());
    }

    #[test]
    fn test_contradictory_assumptions() {
        let mut p = from_dimacs_clauses(2, &[&[1, 2]]);
        assert!(p.propagate(&lits(&[1, -1])));
        assert!(!p.propagate(&lits(&[1, 1])));
    }

    #[test]
    fn test_units_at_level_0() {
        let mut p = from_dimacs_clauses(3, &[&[-1, 2], &[-2, 3]]);
        assert!(p.add_clause(&lits(&[1])));
        assert_eq!(p.proved_at_lvl_0(), &lits(&[1, 2, 3])[..]);
        assert!(p.propagate(&lits(&[-3])));
        assert!(!p.propagate(&lits(&[3])));
        // clause falsified at level 0
        assert!(!p.add_clause(&lits(&[-2, -3])));
        assert!(!p.is_ok());
        assert!(p.propagate(&[]));
    }

    #[test]
    fn test_long_clauses_move_watches() {
        // (1 v 2 v 3 v 4) with -1, -2, -3 forces 4; -4 is a conflict
        let mut p = from_dimacs_clauses(4, &[&[1, 2, 3, 4]]);
        assert!(!p.propagate(&lits(&[-1, -2, -3])));
        assert!(p.propagate(&lits(&[-1, -2, -3, -4])));
        assert!(p.propagate(&lits(&[-4, -3, -2, -1])));
        assert!(!p.propagate(&lits(&[-4, -3, -2])));
        assert!(p.num_propagations() > 0);
    }

    #[test]
    fn test_from_cnf() {
        let cnf = crate::dimacs::parse(&mut "p cnf 3 2\n-1 3 0\n-1 -3 0\n".as_bytes(), true).unwrap();
        let mut p = UnitPropagator::from_cnf(&cnf);
        assert_eq!(p.num_clauses(), 2);
        assert!(p.propagate(&lits(&[1])));
        assert!(!p.propagate(&lits(&[-1])));
        // unknown variables are fine
        assert!(!p.propagate(&lits(&[-1, 10])));
    }
}
