/*****************************************************************************************[extract.rs]
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

//! Compiling a bucket of cuboids into clauses.

use {
    crate::{
        classify::{check_backdoor, cuboids},
        clause::{group_by_size, Clause, Lit, SizeCounts, Var},
        error::{Error, Result},
        minimize::{Cube, Minimizer},
    },
    std::collections::HashSet,
};

/// What the derived clauses say about the bucket they come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Semantics {
    /// Forbid every cuboid of the bucket (used for easy cuboids).
    Exclude,
    /// Allow only the cuboids of the bucket among the backdoor's assignments.
    Entail,
}

/// Clauses derived from one bucket, in canonical order.
#[derive(Clone, Debug, Default)]
pub struct Derived {
    pub clauses: Vec<Clause>,
}

impl Derived {
    pub fn counts(&self) -> SizeCounts {
        SizeCounts::of(&self.clauses)
    }

    /// Whether the empty clause was derived.
    pub fn is_refutation(&self) -> bool {
        self.clauses.iter().any(|c| c.is_empty())
    }

    /// The clauses split into unit, binary, ternary and large ones.
    pub fn by_size(&self) -> [Vec<Clause>; 4] {
        group_by_size(&self.clauses)
    }
}

fn to_cube(backdoor: &[Var], cuboid: &[Lit]) -> Result<Cube> {
    if cuboid.len() != backdoor.len() || cuboid.iter().zip(backdoor).any(|(l, v)| l.var() != *v) {
        return Err(Error::options(format!(
            "cuboid {:?} is not an assignment of backdoor {:?}",
            cuboid, backdoor
        )));
    }
    Ok(cuboid.iter().map(|l| Some(l.sign())).collect())
}

/// The clause ruling out every assignment that extends `cube`.
fn negate_cube(backdoor: &[Var], cube: &Cube) -> Result<Clause> {
    if cube.len() != backdoor.len() {
        return Err(Error::format(format!(
            "minimized cube of width {} for a backdoor of size {}",
            cube.len(),
            backdoor.len()
        )));
    }
    let lits = cube
        .iter()
        .zip(backdoor)
        .filter_map(|(x, &v)| x.map(|sign| Lit::new(v, !sign)))
        .collect();
    Ok(Clause::new(lits))
}

/// Derive clauses that exclude (or entail) exactly the cuboids of `bucket`
/// over the variables of `backdoor`.
///
/// The bucket is handed to `minimizer` as a disjunction of cubes. Excluding
/// a cover means negating each of its cubes; entailing it means excluding
/// its complement. An empty bucket yields no clause, and excluding every
/// cuboid yields the empty clause.
pub fn derive_clauses<M>(
    minimizer: &mut M,
    backdoor: &[Var],
    bucket: &[Vec<Lit>],
    semantics: Semantics,
) -> Result<Derived>
where
    M: Minimizer + ?Sized,
{
    check_backdoor(backdoor)?;
    if bucket.is_empty() {
        return Ok(Derived::default());
    }
    let cubes = bucket
        .iter()
        .map(|c| to_cube(backdoor, c))
        .collect::<Result<Vec<Cube>>>()?;

    let to_exclude = match semantics {
        Semantics::Exclude => cubes,
        Semantics::Entail => {
            let inside: HashSet<&Cube> = cubes.iter().collect();
            let mut outside = vec![];
            for cuboid in cuboids(backdoor) {
                let cube = to_cube(backdoor, &cuboid)?;
                if !inside.contains(&cube) {
                    outside.push(cube);
                }
            }
            outside
        }
    };
    if to_exclude.is_empty() {
        return Ok(Derived::default());
    }

    let cover = minimizer.minimize(backdoor.len(), &to_exclude)?;
    let mut clauses = cover
        .iter()
        .map(|cube| negate_cube(backdoor, cube))
        .collect::<Result<Vec<Clause>>>()?;
    clauses.sort_unstable();
    clauses.dedup();
    trace!(
        "{} cuboids over {:?} ({:?}): {} cubes, {} clauses",
        bucket.len(),
        backdoor,
        semantics,
        cover.len(),
        clauses.len()
    );
    Ok(Derived { clauses })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        classify::partition_tasks,
        ledger::Ledger,
        minimize::Passthrough,
        propagate::from_dimacs_clauses,
    };

    fn vars(ids: &[u32]) -> Vec<Var> {
        ids.iter().map(|&i| Var::new(i)).collect()
    }

    fn lits(ints: &[i32]) -> Vec<Lit> {
        ints.iter().map(|&i| Lit::from_dimacs(i).unwrap()).collect()
    }

    /// The cuboids of `backdoor` that satisfy all of `clauses`.
    fn allowed(backdoor: &[Var], clauses: &[Clause]) -> Vec<Vec<Lit>> {
        cuboids(backdoor)
            .filter(|c| {
                let model: HashSet<Lit> = c.iter().copied().collect();
                clauses.iter().all(|cl| cl.satisfied_by(&model))
            })
            .collect()
    }

    /// Merges everything into the single cube fixing the first input to true.
    struct FirstTrue;

    impl Minimizer for FirstTrue {
        fn minimize(&mut self, n: usize, _: &[Cube]) -> Result<Vec<Cube>> {
            let mut c = vec![None; n];
            c[0] = Some(true);
            Ok(vec![c])
        }
    }

    struct Everything;

    impl Minimizer for Everything {
        fn minimize(&mut self, n: usize, _: &[Cube]) -> Result<Vec<Cube>> {
            Ok(vec![vec![None; n]])
        }
    }

    /// Keeps the positions on which every cube agrees.
    struct CommonPart;

    impl Minimizer for CommonPart {
        fn minimize(&mut self, n: usize, cubes: &[Cube]) -> Result<Vec<Cube>> {
            let common = (0..n)
                .map(|i| {
                    let first = cubes.first().and_then(|c| c[i]);
                    if cubes.iter().all(|c| c[i] == first) {
                        first
                    } else {
                        None
                    }
                })
                .collect();
            Ok(vec![common])
        }
    }

    #[test]
    fn test_rederive_into_ledger() {
        let bd = vars(&[1, 2]);
        let bucket = vec![lits(&[1, 2]), lits(&[1, -2])];
        let mut ledger = Ledger::new();

        let derived = derive_clauses(&mut Passthrough, &bd, &bucket, Semantics::Exclude).unwrap();
        let first = ledger.record(&derived.clauses, None).unwrap();
        assert_eq!(first.report.new.total(), 2);
        let again = derive_clauses(&mut Passthrough, &bd, &bucket, Semantics::Exclude).unwrap();
        assert_eq!(again.clauses, derived.clauses);
        let second = ledger.record(&again.clauses, None).unwrap();
        assert_eq!(second.report.derived.total(), 2);
        assert_eq!(second.report.new.total(), 0);
        assert!(second.new_clauses.is_empty());

        // a merging minimizer yields a new unit once, then nothing
        let merged = derive_clauses(&mut CommonPart, &bd, &bucket, Semantics::Exclude).unwrap();
        assert_eq!(merged.clauses, vec![Clause::from_dimacs(&[-1]).unwrap()]);
        let third = ledger.record(&merged.clauses, None).unwrap();
        assert_eq!(third.new_clauses, merged.clauses);
        let merged = derive_clauses(&mut CommonPart, &bd, &bucket, Semantics::Exclude).unwrap();
        let fourth = ledger.record(&merged.clauses, None).unwrap();
        assert_eq!(fourth.report.new.total(), 0);
        assert!(fourth.new_clauses.is_empty());
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn test_exclude_easy_bucket() {
        // x1 conflicts on its own, x2 is free
        let mut p = from_dimacs_clauses(3, &[&[-1, 3], &[-1, -3]]);
        let bd = vars(&[1, 2]);
        let tasks = partition_tasks(&mut p, &bd).unwrap();
        assert_eq!((tasks.hard.len(), tasks.easy.len()), (2, 2));
        assert_eq!(tasks.rho(), 0.5);

        let derived = derive_clauses(&mut Passthrough, &bd, &tasks.easy, Semantics::Exclude).unwrap();
        assert_eq!(derived.clauses.len(), 2);
        assert_eq!(allowed(&bd, &derived.clauses), tasks.hard);
        assert_eq!(derived.counts().total(), 2);

        let merged = derive_clauses(&mut FirstTrue, &bd, &tasks.easy, Semantics::Exclude).unwrap();
        assert_eq!(merged.clauses, vec![Clause::from_dimacs(&[-1]).unwrap()]);
        assert_eq!(allowed(&bd, &merged.clauses), tasks.hard);
        assert_eq!(merged.by_size()[0].len(), 1);
    }

    #[test]
    fn test_entail() {
        let bd = vars(&[4, 2]);
        let bucket = vec![lits(&[4, -2])];
        let derived = derive_clauses(&mut Passthrough, &bd, &bucket, Semantics::Entail).unwrap();
        assert_eq!(allowed(&bd, &derived.clauses), bucket);
        // canonical order: by length, then magnitudes
        assert!(derived.clauses.windows(2).all(|w| w[0] <= w[1]));
        assert!(derived.clauses.iter().all(|c| c.lits()[0].var() == Var::new(2)));

        let all: Vec<Vec<Lit>> = cuboids(&bd).collect();
        let none = derive_clauses(&mut Passthrough, &bd, &all, Semantics::Entail).unwrap();
        assert!(none.clauses.is_empty());
    }

    #[test]
    fn test_empty_and_full_buckets() {
        let bd = vars(&[1, 2]);
        for &sem in &[Semantics::Exclude, Semantics::Entail] {
            assert!(derive_clauses(&mut Passthrough, &bd, &[], sem)
                .unwrap()
                .clauses
                .is_empty());
        }
        let all: Vec<Vec<Lit>> = cuboids(&bd).collect();
        let refuted = derive_clauses(&mut Everything, &bd, &all, Semantics::Exclude).unwrap();
        assert!(refuted.is_refutation());
        assert_eq!(refuted.counts().total(), 0);
    }

    #[test]
    fn test_bad_cuboid() {
        let bd = vars(&[1, 2]);
        let bucket = vec![lits(&[2, 1])];
        assert!(matches!(
            derive_clauses(&mut Passthrough, &bd, &bucket, Semantics::Exclude),
            Err(Error::Options(_))
        ));
    }
}
