//! Test suites for the switchboard server.

mod support;
