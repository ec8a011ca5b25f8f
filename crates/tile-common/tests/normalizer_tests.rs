//! Property tests for coordinate canonicalization and key derivation.

use proptest::prelude::*;
use tile_common::{
    canonicalize, consumer_key, world_width, DefaultKeyStrategy, KeyStrategy, RawTileCoord,
    Request, TileScheme,
};

fn raw_coord() -> impl Strategy<Value = RawTileCoord> {
    (0u32..=20, any::<bool>()).prop_flat_map(|(z, tms)| {
        let n = world_width(z);
        (-4 * n..4 * n, 0..n).prop_map(move |(x, y)| RawTileCoord {
            z,
            x,
            y,
            scheme: if tms { TileScheme::Tms } else { TileScheme::Xyz },
        })
    })
}

proptest! {
    #[test]
    fn canonicalize_is_idempotent(raw in raw_coord()) {
        let once = canonicalize(&raw).unwrap();
        let twice = canonicalize(&once.to_raw()).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn canonical_column_is_in_range(raw in raw_coord()) {
        let coord = canonicalize(&raw).unwrap();
        prop_assert!((coord.x as i64) < world_width(coord.z));
        prop_assert!((coord.y as i64) < world_width(coord.z));
        prop_assert_eq!(coord.z, raw.z);
    }

    #[test]
    fn world_copies_share_one_key(raw in raw_coord(), copies in -3i64..3) {
        let shifted = RawTileCoord { x: raw.x + copies * world_width(raw.z), ..raw };
        let keys = DefaultKeyStrategy;
        let key_of = |coord: &RawTileCoord| {
            let canonical = canonicalize(coord).unwrap();
            keys.request_key(&Request::tile("idx", "es", canonical, None)).unwrap()
        };
        let (a, b) = (key_of(&raw), key_of(&shifted));
        prop_assert_eq!(a, b);
        if copies != 0 {
            prop_assert_ne!(consumer_key(&raw), consumer_key(&shifted));
        }
    }
}

#[test]
fn test_left_wrapped_column_matches_last_column() {
    let a = canonicalize(&RawTileCoord::new(2, -1, 3)).unwrap();
    let b = canonicalize(&RawTileCoord::new(2, 3, 3)).unwrap();
    assert_eq!(a, b);
}
