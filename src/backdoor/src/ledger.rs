/*****************************************************************************************[ledger.rs]
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

//! Deduplication ledger for derived clauses.

use {
    crate::{
        clause::{Clause, SizeClass, SizeCounts},
        dimacs::Cnf,
        error::{Error, Result},
    },
    std::{collections::HashSet, fmt},
};

/// Counts for one batch of derived clauses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Report {
    /// All clauses of the batch.
    pub derived: SizeCounts,
    /// Clauses not seen before.
    pub new: SizeCounts,
    /// Clauses already present in the base formula.
    pub in_cnf: SizeCounts,
}

impl std::ops::AddAssign for Report {
    fn add_assign(&mut self, rhs: Self) {
        self.derived += rhs.derived;
        self.new += rhs.new;
        self.in_cnf += rhs.in_cnf;
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "derived {} ({} new, {} in cnf)",
            self.derived.total(),
            self.new.total(),
            self.in_cnf.total()
        )
    }
}

/// Result of [`Ledger::record`].
#[derive(Clone, Debug, Default)]
pub struct Recorded {
    pub report: Report,
    /// The clauses that were not known yet, in the order given.
    pub new_clauses: Vec<Clause>,
}

/// All clauses derived so far, one set per size class.
///
/// The ledger never holds a unit together with its negation.
#[derive(Debug, Default)]
pub struct Ledger {
    sets: [HashSet<Clause>; 4],
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, c: &Clause) -> bool {
        match c.size_class() {
            Some(class) => self.sets[class.index()].contains(c),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sets.iter().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of known clauses per size class.
    pub fn totals(&self) -> SizeCounts {
        let mut counts = SizeCounts::new();
        for &class in &SizeClass::ALL {
            counts.add(class, self.sets[class.index()].len());
        }
        counts
    }

    pub fn clear(&mut self) {
        for s in self.sets.iter_mut() {
            s.clear();
        }
    }

    /// All known clauses in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = &Clause> {
        let mut all: Vec<&Clause> = self.sets.iter().flat_map(|s| s.iter()).collect();
        all.sort_unstable();
        all.into_iter()
    }

    /// Insert the canonical clauses `clauses`, counting which are new and,
    /// if `base` is given, which already occur in the base formula.
    ///
    /// Fails with [`Error::Refuted`] on the empty clause, and with an
    /// inconsistency on a unit whose negation is known.
    pub fn record<'a, I>(&mut self, clauses: I, base: Option<&Cnf>) -> Result<Recorded>
    where
        I: IntoIterator<Item = &'a Clause>,
    {
        let mut out = Recorded::default();
        for c in clauses {
            let class = match c.size_class() {
                Some(class) => class,
                None => return Err(Error::Refuted),
            };
            out.report.derived.add(class, 1);
            if base.map_or(false, |cnf| cnf.contains(c)) {
                out.report.in_cnf.add(class, 1);
            }
            if class == SizeClass::Unit {
                let neg = Clause::unit(!c.lits()[0]);
                if self.sets[class.index()].contains(&neg) {
                    return Err(Error::inconsistency(format!(
                        "derived unit {} contradicts known unit {}",
                        c, neg
                    )));
                }
            }
            if self.sets[class.index()].insert(c.clone()) {
                out.report.new.add(class, 1);
                out.new_clauses.push(c.clone());
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn clauses(cs: &[&[i32]]) -> Vec<Clause> {
        cs.iter().map(|c| Clause::from_dimacs(c).unwrap()).collect()
    }

    #[test]
    fn test_dedup_idempotent() {
        let batch = clauses(&[&[1, -2], &[3], &[2, 4, 5], &[1, 2, 3, 4]]);
        let mut l = Ledger::new();
        let first = l.record(&batch, None).unwrap();
        assert_eq!(first.report.new.total(), 4);
        assert_eq!(first.new_clauses, batch);
        let second = l.record(&batch, None).unwrap();
        assert_eq!(second.report.new.total(), 0);
        assert_eq!(second.report.derived, first.report.derived);
        assert!(second.new_clauses.is_empty());
        assert_eq!(l.totals().get(SizeClass::Large), 1);
        assert_eq!(l.len(), 4);
    }

    #[test]
    fn test_unit_contradiction() {
        let mut l = Ledger::new();
        l.record(&clauses(&[&[-7]]), None).unwrap();
        assert!(matches!(
            l.record(&clauses(&[&[7]]), None),
            Err(Error::Inconsistency(_))
        ));
        assert!(matches!(
            l.record(&[Clause::empty()], None),
            Err(Error::Refuted)
        ));
    }

    #[test]
    fn test_in_cnf_and_order() {
        let cnf = crate::dimacs::parse(&mut "p cnf 3 2\n1 2 0\n-3 0\n".as_bytes(), true).unwrap();
        let mut l = Ledger::new();
        let rec = l
            .record(&clauses(&[&[2, 1], &[1, 3], &[-3]]), Some(&cnf))
            .unwrap();
        assert_eq!(rec.report.in_cnf.total(), 2);
        assert_eq!(rec.report.in_cnf.get(SizeClass::Unit), 1);
        let order: Vec<String> = l.iter().map(|c| c.to_string()).collect();
        assert_eq!(order, vec!["-3 0", "1 2 0", "1 3 0"]);
        l.clear();
        assert!(l.is_empty());
    }
}
