mod dump_tests;
mod serve_tests;
