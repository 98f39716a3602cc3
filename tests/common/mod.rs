//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use flightcore::PropertyTree;

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Write `value` to `/node/path/attr`.
pub fn put(tree: &mut PropertyTree, address: &str, value: impl Into<flightcore::Value>) {
    let prop = tree.resolve(address).expect("valid address");
    tree.set(prop, value);
}

/// Read `/node/path/attr` as a float (0.0 when unset).
pub fn get(tree: &PropertyTree, address: &str) -> f64 {
    tree.find(address).map(|p| tree.get_f64(p)).unwrap_or(0.0)
}

/// Whether `/node/path/attr` has ever been written.
pub fn is_written(tree: &PropertyTree, address: &str) -> bool {
    tree.find(address).is_some_and(|p| tree.is_set(p))
}
