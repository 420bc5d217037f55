// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod support;
pub mod formula_tests;
pub mod e2e_tests;
