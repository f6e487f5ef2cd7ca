//! Observer tests against in-memory platform stacks.

mod network_test;
mod positioning_test;
mod subscription_test;
