/*****************************************************************************************[classify.rs]
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

//! Task classification: splitting the cuboids of a backdoor into hard and easy.

use {
    crate::{
        clause::{Lit, Var},
        error::{Error, Result},
        interface::{Propagate, SolveLimited, SolveResult},
    },
    std::collections::HashSet,
};

/// Largest backdoor whose cuboids we are willing to enumerate.
pub const MAX_BACKDOOR_SIZE: usize = 30;

/// The `m`-th cuboid of `backdoor`: bit `k-1-i` of `m` set means variable `i`
/// is negative, so the all-positive cuboid comes first and the last variable
/// varies fastest.
pub fn cuboid(backdoor: &[Var], m: u64) -> Vec<Lit> {
    let k = backdoor.len();
    backdoor
        .iter()
        .enumerate()
        .map(|(i, &v)| Lit::new(v, (m >> (k - 1 - i)) & 1 == 0))
        .collect()
}

/// All `2^k` cuboids of `backdoor`, in enumeration order.
pub fn cuboids(backdoor: &[Var]) -> impl Iterator<Item = Vec<Lit>> + '_ {
    (0..(1u64 << backdoor.len())).map(move |m| cuboid(backdoor, m))
}

/// Check that `backdoor` is small enough and has no repeated variable.
pub fn check_backdoor(backdoor: &[Var]) -> Result<()> {
    if backdoor.len() > MAX_BACKDOOR_SIZE {
        return Err(Error::options(format!(
            "backdoor of size {} is larger than {}",
            backdoor.len(),
            MAX_BACKDOOR_SIZE
        )));
    }
    let mut seen = HashSet::new();
    for v in backdoor {
        if !seen.insert(v) {
            return Err(Error::options(format!(
                "variable {} occurs twice in backdoor {:?}",
                v, backdoor
            )));
        }
    }
    Ok(())
}

/// Classification of the cuboids of a backdoor.
#[derive(Clone, Debug, Default)]
pub struct Tasks {
    pub backdoor: Vec<Var>,
    /// Cuboids where propagation finds no conflict (and, after refinement,
    /// the budgeted search gave up).
    pub hard: Vec<Vec<Lit>>,
    /// Cuboids refuted by propagation alone.
    pub easy: Vec<Vec<Lit>>,
    /// Cuboids refuted by the budgeted search.
    pub semi_easy: Vec<Vec<Lit>>,
}

impl Tasks {
    /// Number of cuboids, `2^k`.
    pub fn total(&self) -> u64 {
        1u64 << self.backdoor.len()
    }

    /// Fraction of cuboids refuted by propagation.
    pub fn rho(&self) -> f64 {
        self.easy.len() as f64 / self.total() as f64
    }

    /// Fraction of cuboids refuted by propagation or budgeted search.
    pub fn rho_total(&self) -> f64 {
        (self.easy.len() + self.semi_easy.len()) as f64 / self.total() as f64
    }

    /// Easy and semi-easy cuboids together.
    pub fn easy_equivalent(&self) -> Vec<Vec<Lit>> {
        let mut v = Vec::with_capacity(self.easy.len() + self.semi_easy.len());
        v.extend(self.easy.iter().cloned());
        v.extend(self.semi_easy.iter().cloned());
        v
    }
}

/// Partition the cuboids of `backdoor` into "hard" ones, where the
/// assumptions do not lead to a conflict by unit propagation, and "easy"
/// ones, where they do.
pub fn partition_tasks<P>(oracle: &mut P, backdoor: &[Var]) -> Result<Tasks>
where
    P: Propagate + ?Sized,
{
    check_backdoor(backdoor)?;
    let mut tasks = Tasks {
        backdoor: backdoor.to_vec(),
        ..Tasks::default()
    };
    for assumps in cuboids(backdoor) {
        if oracle.propagate(&assumps) {
            tasks.easy.push(assumps);
        } else {
            tasks.hard.push(assumps);
        }
    }
    assert_eq!(
        (tasks.hard.len() + tasks.easy.len()) as u64,
        tasks.total(),
        "partition of {:?} lost cuboids",
        backdoor
    );
    debug!(
        "backdoor {:?}: {} hard and {} easy out of {}",
        backdoor,
        tasks.hard.len(),
        tasks.easy.len(),
        tasks.total()
    );
    Ok(tasks)
}

/// Try to refute each hard cuboid with `conflict_budget` conflicts.
///
/// Refuted cuboids move from `hard` to `semi_easy`; a model for any of them
/// contradicts the unsatisfiability of the formula and aborts. Returns the
/// number of new semi-easy cuboids.
pub fn refine_semi_easy<S>(oracle: &mut S, tasks: &mut Tasks, conflict_budget: u64) -> Result<usize>
where
    S: SolveLimited + ?Sized,
{
    let mut still_hard = Vec::with_capacity(tasks.hard.len());
    let mut n_semi = 0;
    for cube in tasks.hard.drain(..) {
        match oracle.solve_limited(&cube, conflict_budget)? {
            SolveResult::Unsat => {
                tasks.semi_easy.push(cube);
                n_semi += 1;
            }
            SolveResult::Unknown => still_hard.push(cube),
            SolveResult::Sat => {
                return Err(Error::inconsistency(format!(
                    "hard cuboid {:?} is satisfiable",
                    cube
                )))
            }
        }
    }
    tasks.hard = still_hard;
    debug!(
        "backdoor {:?}: {} semi-easy with budget {}, rho_total = {}",
        tasks.backdoor,
        n_semi,
        conflict_budget,
        tasks.rho_total()
    );
    Ok(n_semi)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::propagate::from_dimacs_clauses;

    fn vars(ids: &[u32]) -> Vec<Var> {
        ids.iter().map(|&i| Var::new(i)).collect()
    }

    fn ints(cube: &[Lit]) -> Vec<i32> {
        cube.iter().map(|l| l.to_dimacs()).collect()
    }

    /// Conflicts exactly when x1 is assumed true.
    struct X1Conflicts;

    impl Propagate for X1Conflicts {
        fn propagate(&mut self, assumps: &[Lit]) -> bool {
            assumps.iter().any(|l| l.to_dimacs() == 1)
        }
        fn add_clause(&mut self, _: &[Lit]) -> bool {
            true
        }
    }

    /// Answers from a fixed table keyed by the cuboid.
    struct Table(Vec<(Vec<i32>, SolveResult)>, usize);

    impl SolveLimited for Table {
        fn solve_limited(&mut self, assumps: &[Lit], _budget: u64) -> Result<SolveResult> {
            self.1 += 1;
            let key = ints(assumps);
            Ok(self
                .0
                .iter()
                .find(|(c, _)| *c == key)
                .map(|(_, r)| *r)
                .unwrap_or(SolveResult::Unknown))
        }
    }

    #[test]
    fn test_enumeration_order() {
        let bd = vars(&[3, 7]);
        let all: Vec<Vec<i32>> = cuboids(&bd).map(|c| ints(&c)).collect();
        assert_eq!(all, vec![vec![3, 7], vec![3, -7], vec![-3, 7], vec![-3, -7]]);
    }

    #[test]
    fn test_two_var_backdoor() {
        let mut oracle = X1Conflicts;
        let tasks = partition_tasks(&mut oracle, &vars(&[1, 2])).unwrap();
        assert_eq!(tasks.hard.len(), 2);
        assert_eq!(tasks.easy.len(), 2);
        assert_eq!(tasks.rho(), 0.5);
        let easy: Vec<Vec<i32>> = tasks.easy.iter().map(|c| ints(c)).collect();
        assert_eq!(easy, vec![vec![1, 2], vec![1, -2]]);
    }

    #[test]
    fn test_exhaustive_with_propagator() {
        let mut p = from_dimacs_clauses(
            6,
            &[&[-1, 2], &[-2, -3], &[1, 4, 5], &[-5, 6], &[-4, -6]],
        );
        for k in 0..=5u32 {
            let bd: Vec<Var> = (1..=k).map(Var::new).collect();
            let tasks = partition_tasks(&mut p, &bd).unwrap();
            assert_eq!((tasks.hard.len() + tasks.easy.len()) as u64, 1u64 << k);
            let hard: HashSet<Vec<Lit>> = tasks.hard.iter().cloned().collect();
            assert!(tasks.easy.iter().all(|c| !hard.contains(c)));
        }
    }

    #[test]
    fn test_bad_backdoors() {
        let mut oracle = X1Conflicts;
        assert!(matches!(
            partition_tasks(&mut oracle, &vars(&[1, 2, 1])),
            Err(Error::Options(_))
        ));
        let big: Vec<Var> = (1..=31).map(Var::new).collect();
        assert!(check_backdoor(&big).is_err());
    }

    #[test]
    fn test_refine() {
        let mut oracle = X1Conflicts;
        let mut tasks = partition_tasks(&mut oracle, &vars(&[1, 2])).unwrap();
        let hard_before: HashSet<Vec<Lit>> = tasks.hard.iter().cloned().collect();
        let rho = tasks.rho();

        let mut solver = Table(vec![(vec![-1, 2], SolveResult::Unsat)], 0);
        let n = refine_semi_easy(&mut solver, &mut tasks, 1000).unwrap();
        assert_eq!(n, 1);
        assert_eq!(solver.1, 2);
        assert_eq!(tasks.hard.len(), 1);
        assert_eq!(ints(&tasks.hard[0]), vec![-1, -2]);
        assert!(tasks.semi_easy.iter().all(|c| hard_before.contains(c)));
        assert!(tasks.rho_total() >= rho);
        assert_eq!(tasks.rho_total(), 0.75);
        assert_eq!(tasks.easy_equivalent().len(), 3);
    }

    #[test]
    fn test_refine_sat_is_fatal() {
        let mut oracle = X1Conflicts;
        let mut tasks = partition_tasks(&mut oracle, &vars(&[1, 2])).unwrap();
        let mut solver = Table(vec![(vec![-1, -2], SolveResult::Sat)], 0);
        assert!(matches!(
            refine_semi_easy(&mut solver, &mut tasks, 10),
            Err(Error::Inconsistency(_))
        ));
    }
}
