// Intentionally empty: this crate exists for the tests/ directory.
