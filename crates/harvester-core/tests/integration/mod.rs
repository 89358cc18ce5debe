mod cache_tests;
mod common;
mod orchestration_tests;
mod pipeline_tests;
