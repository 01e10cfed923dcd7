//! Symmetry-branch alignment of an orientation sequence.
//!
//! EBSD indexers report an arbitrary one of the symmetry-equivalent
//! representations at each scan. Before any component-wise smoothing the
//! sequence is walked in order and every point is replaced by the equivalent
//! closest to its already-aligned predecessor. The quaternion sign is then
//! fixed so consecutive points lie in the same hemisphere.

use crate::orientation::Orientation;
use crate::symmetry::CrystalSymmetry;

/// Align `raw` onto a single continuous symmetry branch.
///
/// The first orientation is kept as-is.
pub fn align_branches(raw: &[Orientation], symmetry: &CrystalSymmetry) -> Vec<Orientation> {
    let mut aligned: Vec<Orientation> = Vec::with_capacity(raw.len());
    for o in raw {
        let next = match aligned.last() {
            None => *o,
            Some(prev) => {
                let (closest, _) = symmetry.closest_equivalent(o, prev);
                same_hemisphere(&closest, prev)
            }
        };
        aligned.push(next);
    }
    aligned
}

/// Flip the sign of `o` if needed so its dot product with `reference` is non-negative.
fn same_hemisphere(o: &Orientation, reference: &Orientation) -> Orientation {
    if o.quaternion().coords.dot(&reference.quaternion().coords) < 0.0 {
        // −q is the same rotation; the stored components matter for fitting.
        o.negated()
    } else {
        *o
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orientation::{EulerBunge, EulerConvention};

    #[test]
    fn removes_injected_branch_jumps() {
        let cubic = CrystalSymmetry::cubic();
        let truth: Vec<Orientation> = (0..6)
            .map(|i| {
                Orientation::from_euler(
                    &EulerBunge::new(0.4 + 0.01 * i as f64, 0.7, 1.2),
                    EulerConvention::Passive,
                )
                .unwrap()
            })
            .collect();
        let scrambled: Vec<Orientation> = truth
            .iter()
            .enumerate()
            .map(|(i, o)| o.symmetric(&cubic.quaternions()[(i * 5) % 24]))
            .collect();

        let aligned = align_branches(&scrambled, &cubic);
        for (a, t) in aligned.iter().zip(&truth) {
            assert!(a.angle_to(t) < 1e-9);
        }
        for w in aligned.windows(2) {
            assert!(w[0].quaternion().coords.dot(&w[1].quaternion().coords) >= 0.0);
        }
    }

    #[test]
    fn first_point_is_kept() {
        let cubic = CrystalSymmetry::cubic();
        let o = Orientation::from_euler(&EulerBunge::new(2.0, 1.0, 0.5), EulerConvention::Passive)
            .unwrap();
        let aligned = align_branches(&[o], &cubic);
        assert_eq!(aligned, vec![o]);
        assert!(align_branches(&[], &cubic).is_empty());
    }
}
