//! Rotation-aware fit testing for axis-aligned parcels.
//!
//! An item fits a box when some assignment of its three edges to the box's
//! (length, width, height) axes keeps every edge within the box. All six
//! assignments are enumerated in a fixed order so the reported orientation is
//! deterministic.

use serde::Serialize;
use utoipa::ToSchema;

use crate::types::Dims;

/// The six edge permutations, in enumeration order.
///
/// Entry `[a, b, c]` maps item edge `a` onto the box length, `b` onto the
/// width and `c` onto the height.
pub const ORIENTATIONS: [[usize; 3]; 6] = [
    [0, 1, 2],
    [0, 2, 1],
    [1, 0, 2],
    [1, 2, 0],
    [2, 0, 1],
    [2, 1, 0],
];

/// A successful fit: which permutation was used and the rotated item.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, ToSchema)]
pub struct Orientation {
    pub permutation: [usize; 3],
    pub dims: Dims,
}

/// Rotates `dims` by a permutation from [`ORIENTATIONS`].
#[inline]
pub fn rotate(dims: &Dims, permutation: [usize; 3]) -> Dims {
    let edges = dims.as_array();
    Dims::new(
        edges[permutation[0]],
        edges[permutation[1]],
        edges[permutation[2]],
    )
}

/// Returns the first orientation in which `item` fits inside `container`.
///
/// Comparison is exact (`<=`, no tolerance). `None` is an ordinary negative
/// answer, not an error.
///
/// # Examples
/// ```
/// use usps_box_packer::geometry::fits;
/// use usps_box_packer::types::Dims;
///
/// let boxed = Dims::new(8.0, 6.0, 4.0);
/// assert!(fits(&Dims::new(3.0, 6.0, 5.0), &boxed).is_some());
/// assert!(fits(&Dims::new(9.0, 1.0, 1.0), &boxed).is_none());
/// ```
pub fn fits(item: &Dims, container: &Dims) -> Option<Orientation> {
    ORIENTATIONS.iter().find_map(|&permutation| {
        let rotated = rotate(item, permutation);
        rotated.fits_within(container).then_some(Orientation {
            permutation,
            dims: rotated,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_rotations(dims: &Dims) -> Vec<Dims> {
        ORIENTATIONS.iter().map(|&p| rotate(dims, p)).collect()
    }

    #[test]
    fn identity_orientation_is_tried_first() {
        let found = fits(&Dims::new(2.0, 2.0, 2.0), &Dims::new(10.0, 10.0, 10.0)).unwrap();
        assert_eq!(found.permutation, [0, 1, 2]);
    }

    #[test]
    fn finds_rotation_when_identity_does_not_fit() {
        let found = fits(&Dims::new(6.0, 5.0, 3.0), &Dims::new(3.0, 6.0, 5.0)).unwrap();
        assert_eq!(found.dims, Dims::new(3.0, 6.0, 5.0));
        assert_eq!(found.permutation, [2, 0, 1]);
    }

    #[test]
    fn boundary_equality_fits() {
        assert!(fits(&Dims::new(8.0, 6.0, 4.0), &Dims::new(4.0, 8.0, 6.0)).is_some());
    }

    #[test]
    fn rejects_item_with_edge_longer_than_any_box_edge() {
        assert!(fits(&Dims::new(12.5, 1.0, 1.0), &Dims::new(12.0, 12.0, 12.0)).is_none());
    }

    #[test]
    fn rejects_when_no_single_rotation_fits_all_axes() {
        // Each edge fits somewhere, but never all three at once.
        assert!(fits(&Dims::new(7.0, 7.0, 1.0), &Dims::new(8.0, 6.0, 6.0)).is_none());
    }

    #[test]
    fn fit_result_is_invariant_under_item_rotation() {
        let boxes = [
            Dims::new(8.0, 6.0, 4.0),
            Dims::new(12.0, 10.0, 8.0),
            Dims::new(5.0, 5.0, 20.0),
        ];
        let items = [
            Dims::new(6.0, 5.0, 3.0),
            Dims::new(4.0, 19.0, 2.0),
            Dims::new(9.0, 9.0, 9.0),
            Dims::new(8.0, 4.0, 6.0),
        ];
        for container in &boxes {
            for item in &items {
                let expected = fits(item, container).is_some();
                for rotated in all_rotations(item) {
                    assert_eq!(
                        fits(&rotated, container).is_some(),
                        expected,
                        "rotating {:?} changed the fit in {:?}",
                        item,
                        container
                    );
                }
            }
        }
    }
}
