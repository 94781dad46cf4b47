//! Built-in suites.

pub mod pax;

use rulebench_harness::TestCase;

/// Every built-in case, in declaration order.
pub fn builtin() -> Vec<Box<dyn TestCase>> {
    pax::cases()
}
