//! Shared proptest strategies for schema tests.

use proptest::prelude::*;

/// Strategy for generating identifier-like target and class names.
pub fn arb_name() -> impl Strategy<Value = String> {
    "[A-Za-z_][A-Za-z0-9_]{0,19}"
}
