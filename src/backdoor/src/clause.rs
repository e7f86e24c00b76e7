/*****************************************************************************************[clause.rs]
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

use {
    crate::error::{Error, Result},
    std::{cmp::Ordering, collections::HashSet, fmt, ops},
};

/// A propositional variable, identified by its 1-based DIMACS id.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Var(u32);

impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Var {
    #[inline(always)]
    pub fn new(id: u32) -> Self {
        debug_assert!(id > 0, "Var::new: ids are 1-based");
        debug_assert!(id <= i32::MAX as u32, "Var::new: id too large");
        Var(id)
    }

    /// Make a variable from a 0-based index.
    #[inline]
    pub fn from_idx(idx: u32) -> Self {
        Var::new(idx + 1)
    }

    #[inline(always)]
    pub fn id(&self) -> u32 {
        self.0
    }

    #[inline(always)]
    pub fn idx(&self) -> u32 {
        self.0 - 1
    }
}

/// A literal: a variable together with a polarity.
///
/// Internally this is the signed DIMACS integer, so it is never zero.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Lit(i32);

impl Lit {
    /// `Lit::new(v, true)` is the positive literal of `v`.
    #[inline(always)]
    pub fn new(var: Var, sign: bool) -> Self {
        let i = var.0 as i32;
        Lit(if sign { i } else { -i })
    }

    /// Literal from a signed DIMACS integer; `None` for `0`.
    #[inline]
    pub fn from_dimacs(i: i32) -> Option<Self> {
        if i == 0 || i == i32::MIN {
            None
        } else {
            Some(Lit(i))
        }
    }

    #[inline(always)]
    pub fn to_dimacs(&self) -> i32 {
        self.0
    }

    /// `true` for a positive literal.
    #[inline(always)]
    pub fn sign(&self) -> bool {
        self.0 > 0
    }

    #[inline(always)]
    pub fn var(&self) -> Var {
        Var(self.0.unsigned_abs())
    }

    /// `lit.apply_sign(b)` keeps the same sign if `b==true`, flips sign otherwise
    #[inline(always)]
    pub fn apply_sign(&self, sign: bool) -> Lit {
        if sign {
            *self
        } else {
            !*self
        }
    }
}

impl fmt::Debug for Lit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ops::Not for Lit {
    type Output = Self;
    #[inline(always)]
    fn not(self) -> Self {
        Lit(-self.0)
    }
}

// literals are ordered by magnitude first, then negative before positive
impl Ord for Lit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.var().cmp(&other.var()).then(self.0.cmp(&other.0))
    }
}

impl PartialOrd for Lit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Size class of a clause, as used for reporting and deduplication.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SizeClass {
    Unit,
    Binary,
    Ternary,
    Large,
}

impl SizeClass {
    pub const ALL: [SizeClass; 4] = [
        SizeClass::Unit,
        SizeClass::Binary,
        SizeClass::Ternary,
        SizeClass::Large,
    ];

    /// Size class of a clause with `len` literals. The empty clause has none.
    pub fn of(len: usize) -> Option<Self> {
        match len {
            0 => None,
            1 => Some(SizeClass::Unit),
            2 => Some(SizeClass::Binary),
            3 => Some(SizeClass::Ternary),
            _ => Some(SizeClass::Large),
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            SizeClass::Unit => "units",
            SizeClass::Binary => "binary",
            SizeClass::Ternary => "ternary",
            SizeClass::Large => "large",
        }
    }
}

/// A clause in canonical form: literals sorted by magnitude, no repeated literal.
///
/// Clauses are ordered by length, then by the tuple of magnitudes, then by
/// the signed literals.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Clause(Vec<Lit>);

impl Clause {
    /// Canonicalize `lits` into a clause.
    pub fn new(mut lits: Vec<Lit>) -> Self {
        lits.sort_unstable();
        lits.dedup();
        Clause(lits)
    }

    /// Parse a clause from signed DIMACS integers (without the final `0`).
    pub fn from_dimacs(ints: &[i32]) -> Result<Self> {
        let mut lits = Vec::with_capacity(ints.len());
        for &i in ints {
            match Lit::from_dimacs(i) {
                Some(lit) => lits.push(lit),
                None => return Err(Error::format(format!("invalid literal {} in clause", i))),
            }
        }
        Ok(Clause::new(lits))
    }

    pub fn empty() -> Self {
        Clause(vec![])
    }

    pub fn unit(lit: Lit) -> Self {
        Clause(vec![lit])
    }

    #[inline]
    pub fn lits(&self) -> &[Lit] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn size_class(&self) -> Option<SizeClass> {
        SizeClass::of(self.0.len())
    }

    /// Does the clause contain a literal and its negation?
    pub fn is_tautology(&self) -> bool {
        self.0.windows(2).any(|w| w[0].var() == w[1].var())
    }

    /// Is the clause satisfied by the (partial) assignment given as a set of true literals?
    pub fn satisfied_by(&self, model: &HashSet<Lit>) -> bool {
        self.0.iter().any(|lit| model.contains(lit))
    }

    pub fn into_lits(self) -> Vec<Lit> {
        self.0
    }
}

impl AsRef<[Lit]> for Clause {
    fn as_ref(&self) -> &[Lit] {
        &self.0
    }
}

impl Ord for Clause {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| {
                let a = self.0.iter().map(|l| l.var());
                let b = other.0.iter().map(|l| l.var());
                a.cmp(b)
            })
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Clause {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for Clause {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

/// Prints the clause as a DIMACS line, without the trailing newline.
impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for lit in &self.0 {
            write!(f, "{} ", lit)?;
        }
        write!(f, "0")
    }
}

/// Number of clauses in each size class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SizeCounts([usize; 4]);

impl SizeCounts {
    pub fn new() -> Self {
        SizeCounts::default()
    }

    /// Count the clauses of `clauses` by size class (the empty clause is not counted).
    pub fn of<'a, I, C>(clauses: I) -> Self
    where
        I: IntoIterator<Item = &'a C>,
        C: AsRef<[Lit]> + ?Sized + 'a,
    {
        let mut counts = SizeCounts::new();
        for c in clauses {
            if let Some(class) = SizeClass::of(c.as_ref().len()) {
                counts.add(class, 1);
            }
        }
        counts
    }

    #[inline]
    pub fn get(&self, class: SizeClass) -> usize {
        self.0[class.index()]
    }

    #[inline]
    pub fn add(&mut self, class: SizeClass, n: usize) {
        self.0[class.index()] += n;
    }

    pub fn total(&self) -> usize {
        self.0.iter().sum()
    }
}

impl ops::AddAssign for SizeCounts {
    fn add_assign(&mut self, rhs: Self) {
        for i in 0..4 {
            self.0[i] += rhs.0[i];
        }
    }
}

impl fmt::Display for SizeCounts {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} units, {} binary, {} ternary, {} large",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// Split clauses into the four size classes, preserving their relative order.
/// The empty clause is dropped.
pub fn group_by_size(clauses: &[Clause]) -> [Vec<Clause>; 4] {
    let mut groups: [Vec<Clause>; 4] = Default::default();
    for c in clauses {
        if let Some(class) = c.size_class() {
            groups[class.index()].push(c.clone());
        }
    }
    groups
}

#[cfg(test)]
mod test {
    use super::*;

    fn lit(i: i32) -> Lit {
        Lit::from_dimacs(i).unwrap()
    }

    fn clause(ints: &[i32]) -> Clause {
        Clause::from_dimacs(ints).unwrap()
    }

    #[test]
    fn test_lit_var_sign() {
        let v = Var::new(5);
        assert_eq!(Lit::new(v, true).to_dimacs(), 5);
        assert_eq!(Lit::new(v, false).to_dimacs(), -5);
        assert_eq!(lit(-5).var(), v);
        assert!(!lit(-5).sign());
        assert_eq!(!lit(3), lit(-3));
        assert_eq!(lit(3).apply_sign(false), lit(-3));
        assert_eq!(lit(3).apply_sign(true), lit(3));
        assert_eq!(Lit::from_dimacs(0), None);
        assert_eq!(Var::from_idx(0), Var::new(1));
    }

    #[test]
    fn test_canonical_order() {
        let c = clause(&[-7, 2, -3, 2]);
        assert_eq!(c.lits(), &[lit(2), lit(-3), lit(-7)]);
        assert_eq!(format!("{}", c), "2 -3 -7 0");
        assert_eq!(format!("{:?}", c), "[2, -3, -7]");
    }

    #[test]
    fn test_clause_family_order() {
        let mut cs = vec![
            clause(&[1, 2, 3]),
            clause(&[3, -4]),
            clause(&[-1, 2]),
            clause(&[5]),
            clause(&[1, 2]),
            clause(&[-2]),
        ];
        cs.sort();
        let got: Vec<String> = cs.iter().map(|c| c.to_string()).collect();
        assert_eq!(
            got,
            vec!["-2 0", "5 0", "-1 2 0", "1 2 0", "3 -4 0", "1 2 3 0"]
        );
    }

    #[test]
    fn test_size_classes() {
        assert_eq!(clause(&[1]).size_class(), Some(SizeClass::Unit));
        assert_eq!(clause(&[1, 2, 3, 4, 5]).size_class(), Some(SizeClass::Large));
        assert_eq!(Clause::empty().size_class(), None);
        let cs = vec![clause(&[1]), clause(&[2, 3]), clause(&[1, 2, 3, 4]), clause(&[-4])];
        let counts = SizeCounts::of(&cs);
        assert_eq!(counts.get(SizeClass::Unit), 2);
        assert_eq!(counts.get(SizeClass::Binary), 1);
        assert_eq!(counts.get(SizeClass::Ternary), 0);
        assert_eq!(counts.get(SizeClass::Large), 1);
        assert_eq!(counts.total(), 4);
        let groups = group_by_size(&cs);
        assert_eq!(groups[0], vec![clause(&[1]), clause(&[-4])]);
    }

    #[test]
    fn test_tautology_and_model() {
        assert!(clause(&[1, -1, 2]).is_tautology());
        assert!(!clause(&[1, 2]).is_tautology());
        let model: HashSet<Lit> = vec![lit(1), lit(-2)].into_iter().collect();
        assert!(clause(&[-1, -2]).satisfied_by(&model));
        assert!(!clause(&[-1, 2]).satisfied_by(&model));
    }

    #[test]
    fn test_from_dimacs_rejects_zero() {
        assert!(Clause::from_dimacs(&[1, 0, 2]).is_err());
    }
}
