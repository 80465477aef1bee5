//! Random-walk driver used to exercise a server without a human at the keys.

use crate::world::ClientWorld;
use rand::seq::SliceRandom;
use rand::Rng;

const STEPS: [(i8, i8); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Picks a unit step toward a tile the mirror believes is walkable.
///
/// `None` until the local player has a known position, or when it is boxed in.
pub fn choose_step<R: Rng + ?Sized>(world: &ClientWorld, rng: &mut R) -> Option<(i8, i8)> {
    let (x, y) = world.local_player()?.position?;
    let open: Vec<(i8, i8)> = STEPS
        .iter()
        .copied()
        .filter(|(dx, dy)| world.is_walkable(x + *dx as i32, y + *dy as i32))
        .collect();
    open.choose(rng).copied()
}
